//! Timeout handling example

use spectcl::{ExpectError, Expectations, Flow, Pattern, Session};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Spectcl - Timeout Handling Example");
    println!("{}", "=".repeat(50));

    // Example 1: Timeout as an error
    println!("\n1. Timeout reported as a failure");
    let session = Session::builder()
        .timeout(Duration::from_millis(500))
        .spawn("sleep 2")?;

    let list = Expectations::new()
        .on("NEVER_APPEARS", |_, _, _| Flow::Complete)
        .on(Pattern::Timeout, |session, _, done| {
            let duration = session.config().timeout.unwrap_or_default();
            done.fail(ExpectError::Timeout { duration });
            Flow::Complete
        });

    match session.expect_async(list).await {
        Ok(_) => println!("   ✗ Unexpectedly matched"),
        Err(ExpectError::Timeout { duration }) => {
            println!("   ✓ Timeout occurred after {:?} as expected", duration)
        }
        Err(e) => println!("   ✗ Unexpected error: {}", e),
    }
    session.kill()?;

    // Example 2: No TIMEOUT handler, the expectation completes silently
    println!("\n2. Timeout without a handler");
    let session = Session::builder()
        .timeout(Duration::from_millis(500))
        .spawn("sleep 2")?;

    let outcome = session
        .expect_async(Expectations::new().on("NEVER_APPEARS", |_, _, _| Flow::Complete))
        .await;
    println!("   ✓ Outcome: {:?}", outcome);
    if let Some(m) = session.expect_out().matched {
        println!("   ✓ Resolved by: {}", m.pattern);
    }
    session.kill()?;

    println!("\n{}", "=".repeat(50));
    println!("Timeout handling examples completed!");

    Ok(())
}
