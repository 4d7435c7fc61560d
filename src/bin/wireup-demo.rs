//! wireup-demo - run one streaming-upload scenario against a hub.
//!
//! # Usage
//!
//! ```bash
//! # Sum a stream of numbers
//! wireup-demo tcp://127.0.0.1:5000 sum 1 2 3 4 5
//!
//! # Interleave two word uploads over bounded pipes
//! wireup-demo tcp://127.0.0.1:5000 interleaved "first message" "second message"
//!
//! # Upload a file in 8 KiB chunks
//! wireup-demo unix:///tmp/hub.sock file ./weeg.jpg uploads/bloop.jpg
//!
//! # Verbose logging
//! RUST_LOG=wireup=debug wireup-demo ...
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use wireup::chunk::DEFAULT_CHUNK_SIZE;
use wireup::scenarios::{self, DEFAULT_INTERLEAVED_CAPACITY};
use wireup::{ConnectionBuilder, ConnectionConfig, Pacing, Uploader};

/// Stream local data into remote invocations
#[derive(Parser, Debug)]
#[command(name = "wireup-demo")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Hub address (tcp://host:port, unix:///path or host:port)
    #[arg(env = "WIREUP_URL", value_name = "URL")]
    url: String,

    /// Delay between produced items, in milliseconds
    #[arg(long, default_value_t = 100)]
    delay_ms: u64,

    /// Delay before the first item, in milliseconds
    #[arg(long, default_value_t = 0)]
    initial_delay_ms: u64,

    #[command(subcommand)]
    scenario: Scenario,
}

#[derive(Subcommand, Debug)]
enum Scenario {
    /// Stream numbers into `Sum`
    Sum {
        #[arg(default_values_t = [1, 2, 3, 4, 5])]
        numbers: Vec<i64>,
    },
    /// Stream a word letter by letter into `UploadWord`
    Word {
        #[arg(default_value = "hello")]
        word: String,
    },
    /// Stream text into `UploadWithSuffix` with a scalar suffix
    Suffix {
        #[arg(default_value = "streamed stuff")]
        text: String,
        #[arg(long, default_value = " + wooh I'm a suffix")]
        suffix: String,
    },
    /// Two streams (letters and numbers) into `DoubleTrouble`
    Multi {
        #[arg(long, default_value = "hi!")]
        letters: String,
        #[arg(long, value_delimiter = ',', default_values_t = [1, 2, 3, 4, 5])]
        numbers: Vec<i64>,
    },
    /// Fire-and-forget `LocalSum`
    Send {
        #[arg(default_values_t = [1, 2, 3])]
        numbers: Vec<i64>,
        /// Time to keep the connection open after the producer finishes
        #[arg(long, default_value_t = 1000)]
        linger_ms: u64,
    },
    /// Concurrent `UploadWord` calls over bounded pipes
    Interleaved {
        #[arg(default_values_t = ["first message".to_string(), "second message".to_string()])]
        messages: Vec<String>,
        #[arg(long, default_value_t = DEFAULT_INTERLEAVED_CAPACITY)]
        capacity: usize,
    },
    /// Stream a file in chunks into `UploadFile`
    File {
        source: PathBuf,
        target: String,
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },
}

fn init_logging() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("wireup=info,wireup_demo=info"))
        .context("Invalid log filter")?;

    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging()?;

    let pacing = Pacing::every(Duration::from_millis(args.delay_ms))
        .with_initial_delay(Duration::from_millis(args.initial_delay_ms));

    let connection = ConnectionBuilder::with_config(ConnectionConfig::from_env())
        .connect(&args.url)
        .await
        .with_context(|| format!("Failed to connect to {}", args.url))?;
    let uploader = Uploader::new(connection);

    match args.scenario {
        Scenario::Sum { numbers } => {
            let total = scenarios::sum(&uploader, numbers, pacing).await?;
            info!("Sum: {}", total);
        }
        Scenario::Word { word } => {
            let result = scenarios::basic_run(&uploader, &word, pacing).await?;
            info!("Your message was: {}", result);
        }
        Scenario::Suffix { text, suffix } => {
            let result = scenarios::additional_args(&uploader, &text, &suffix, pacing).await?;
            info!("Your message was: {}", result);
        }
        Scenario::Multi { letters, numbers } => {
            let result = scenarios::multi_param_invoke(&uploader, &letters, numbers, pacing).await?;
            info!("DoubleTrouble: {}", result);
        }
        Scenario::Send { numbers, linger_ms } => {
            let producer = scenarios::basic_send(&uploader, numbers, pacing).await?;
            let produced = producer.join().await?;
            info!("Sent {} items; the hub reports the sum on its side", produced);
            tokio::time::sleep(Duration::from_millis(linger_ms)).await;
        }
        Scenario::Interleaved { messages, capacity } => {
            let messages: Vec<&str> = messages.iter().map(String::as_str).collect();
            let results = scenarios::interleaved_uploads(&uploader, &messages, capacity, pacing).await?;
            info!("Messages: {:?}", results);
        }
        Scenario::File {
            source,
            target,
            chunk_size,
        } => {
            let status = scenarios::file_upload(&uploader, source, &target, chunk_size, pacing).await?;
            info!("Upload complete with status: {}", status);
        }
    }

    Ok(())
}
