use std::{
    error::Error,
    io::{self, Write},
    sync::Arc,
    thread,
};

use clap::Parser;
use cryo_client::{
    Client, ClientConfig, Input,
    client::{DEFAULT_HOST, DEFAULT_PORT},
    prompt,
};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Server host
    #[arg(default_value = DEFAULT_HOST)]
    host: String,
    /// Server port
    #[arg(default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Identity announced to the server; random when omitted
    #[arg(long)]
    id: Option<String>,
    /// Print responses pushed by the server
    #[arg(long)]
    watch: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    // Initialize env_logger; For logging to STDOUT/STDERR
    env_logger::init();

    let cli = Cli::parse();
    let mut config = ClientConfig::new(cli.host, cli.port);
    if let Some(id) = cli.id {
        config = config.with_id(id);
    }

    let client = Arc::new(Client::connect(config)?);

    let handle = Arc::clone(&client);
    ctrlc::set_handler(move || {
        handle.close();
        std::process::exit(0);
    })?;

    if cli.watch {
        let watcher = client.watch()?;
        thread::spawn(move || {
            for resp in watcher {
                println!("\n[watch] {resp}");
            }
        });
    }

    let stdin = io::stdin();
    let stdout = io::stdout();

    loop {
        let input = match prompt(stdin.lock(), stdout.lock()) {
            Ok(input) => input,
            Err(e) => {
                eprintln!("error: {e}");
                continue;
            }
        };

        match input {
            Input::Exit => break,
            Input::Command(command) => {
                let resp = client.fire(&command);
                let mut stdout = stdout.lock();
                writeln!(stdout, "{resp}")?;
            }
        }
    }

    client.close();
    Ok(())
}
