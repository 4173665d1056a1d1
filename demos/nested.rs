//! Nested expectations over an in-memory transport
//!
//! A handler starts a second `expect` and hands it the outer completion
//! handle; the outer call finishes only when the nested one does.

use spectcl::process::{self, Written};
use spectcl::{Expectations, Flow, Session};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Spectcl - Nested Expect Example");
    println!("{}", "=".repeat(50));

    let (process, mut remote) = process::channel();
    let session = Session::builder().attach(process);

    let list = Expectations::new().on("menu>", |session, _, done| {
        let _ = session.send_line("2");
        let nested = Expectations::new().on("selected", |_, m, inner| {
            inner.complete_with(m.before.trim().to_string());
            Flow::Complete
        });
        let outer = done.clone();
        if let Err(e) = session.expect(nested, move |outcome| outer.finish(outcome)) {
            done.fail(e);
        }
        Flow::Complete
    });

    remote.output("1) tea\n2) coffee\nmenu>");
    let pending = tokio::spawn({
        let session = session.clone();
        async move { session.expect_async(list).await }
    });

    if let Some(Written::Data(choice)) = remote.next_input().await {
        let choice = String::from_utf8_lossy(&choice).trim().to_string();
        println!("  child received choice {choice}");
        remote.output(" coffee selected\n");
    }

    let outcome = pending.await??;
    println!("✓ Nested outcome: {:?}", outcome);

    Ok(())
}
