//! Interactive management menu.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

use vpsgate_orchestrator::Orchestrator;

type Input = Lines<BufReader<Stdin>>;

/// Run the menu until the operator exits or stdin closes.
///
/// Command failures are printed and the menu continues.
pub async fn run(orchestrator: &Arc<Orchestrator>) -> Result<()> {
    let mut input = BufReader::new(io::stdin()).lines();

    loop {
        println!("\n=== VPS Management System ===");
        println!("1. Add User");
        println!("2. Remove User");
        println!("3. List Users");
        println!("4. Check Expired Users");
        println!("5. Exit");

        let Some(choice) = ask(&mut input, "Choose an option: ").await? else {
            break;
        };

        let result = match choice.as_str() {
            "1" => add(orchestrator, &mut input).await,
            "2" => remove(orchestrator, &mut input).await,
            "3" => crate::cmd_list(orchestrator).await,
            "4" => crate::cmd_sweep(orchestrator).await,
            "5" => break,
            _ => {
                println!("Invalid option");
                Ok(())
            }
        };

        if let Err(e) = result {
            println!("Error: {:#}", e);
        }
    }

    println!("Goodbye!");
    Ok(())
}

async fn add(orchestrator: &Orchestrator, input: &mut Input) -> Result<()> {
    let Some(username) = ask(input, "Enter username: ").await? else {
        return Ok(());
    };
    let password = crate::prompt_new_password()?;
    let Some(days) = ask(input, "Enter expiration days: ").await? else {
        return Ok(());
    };
    let days: u32 = days
        .parse()
        .with_context(|| format!("Invalid number of days: {}", days))?;

    crate::cmd_add(orchestrator, &username, &password, days).await
}

async fn remove(orchestrator: &Orchestrator, input: &mut Input) -> Result<()> {
    let Some(username) = ask(input, "Enter username to remove: ").await? else {
        return Ok(());
    };
    crate::cmd_remove(orchestrator, &username).await
}

/// Print `prompt` and read one trimmed line. `None` at end of input.
async fn ask(input: &mut Input, prompt: &str) -> Result<Option<String>> {
    let mut stdout = io::stdout();
    stdout.write_all(prompt.as_bytes()).await?;
    stdout.flush().await?;

    let line = input.next_line().await.context("Failed to read input")?;
    Ok(line.map(|l| l.trim().to_string()))
}
