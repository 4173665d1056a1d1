//! Re-arming example: answer a login dialog with `Flow::Continue`
//!
//! The "child" is a shell script that prompts for a user name and a password.

use spectcl::{ExpectError, Expectations, Flow, Pattern, Session};
use std::time::Duration;

const SCRIPT: &str = r#"printf 'user: '; read u; printf 'password: '; read p; echo "welcome $u""#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Spectcl - Login Dialog Example");
    println!("{}", "=".repeat(50));

    let session = Session::builder()
        .timeout(Duration::from_secs(5))
        .spawn_program("sh", &["-c".to_string(), SCRIPT.to_string()])?;

    let list = Expectations::new()
        .on(Pattern::regex("user:")?, |session, _, done| {
            println!("  → sending user name");
            if let Err(e) = session.send_line("alice") {
                done.fail(e);
                return Flow::Complete;
            }
            Flow::Continue
        })
        .on("password:", |session, _, done| {
            println!("  → sending password");
            if let Err(e) = session.send_line("hunter2") {
                done.fail(e);
                return Flow::Complete;
            }
            Flow::Continue
        })
        .on(Pattern::regex(r"welcome (\w+)")?, |_, m, done| {
            done.complete_with(m.captures[1].clone());
            Flow::Complete
        })
        .on(Pattern::Timeout, |_, _, done| {
            done.fail(ExpectError::failed("login dialog stalled"));
            Flow::Complete
        })
        .on(Pattern::Eof, |_, _, done| {
            done.fail(ExpectError::Eof);
            Flow::Complete
        });

    match session.expect_async(list).await {
        Ok(user) => println!("✓ Logged in as {}", user.unwrap_or_default()),
        Err(e) => println!("✗ Login failed: {}", e),
    }

    Ok(())
}
