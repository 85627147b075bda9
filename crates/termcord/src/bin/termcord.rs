use std::io::{self, Write};
use std::process;

#[tokio::main]
async fn main() {
    let code = match termcord::cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("termcord: {e:#}");
            1
        }
    };

    let _ = io::stderr().flush();
    let _ = io::stdout().flush();

    // Exit here rather than returning: a pending stdin read would hold up runtime shutdown
    process::exit(code);
}
