//! Basic command example: match output of a short-lived process

use spectcl::{Expectations, Flow, Pattern, Session};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Spectcl - Basic Command Example");
    println!("{}", "=".repeat(50));

    let session = Session::spawn("echo Hello from Spectcl!")?;

    let list = Expectations::new()
        .on(Pattern::regex(r"Hello from (\w+)")?, |_, m, done| {
            done.complete_with(m.captures[1].clone());
            Flow::Complete
        })
        .on(Pattern::Eof, |_, _, done| {
            done.fail(spectcl::ExpectError::Eof);
            Flow::Complete
        });

    let name = session.expect_async(list).await?;
    println!("✓ Greeting from: {}", name.unwrap_or_default());

    let out = session.expect_out();
    println!("  expect_out.buffer = {:?}", out.buffer);

    let status = session.wait().await?;
    println!("✓ Process exited with: {}", status.exit_code());

    Ok(())
}
