use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use relaydhcp::capture::{hexdump, load_capture};
use relaydhcp::options::OptionCode;
use relaydhcp::{Config, DhcpMessage, DhcpServer, Result, build_offer};

#[derive(Parser)]
#[command(name = "relaydhcp")]
#[command(author, version, about = "A DHCP server for relayed clients", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    Run,
    ShowConfig,
    /// Decode a hexdump capture and show the OFFER it would get
    Inspect {
        capture: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let config = Config::load_or_create(&cli.config)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            info!("Starting DHCP server with config: {:?}", cli.config);
            let mut server = DhcpServer::bind(config)?;

            tokio::select! {
                result = server.run() => result,
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal, stopping server...");
                    Ok(())
                }
            }
        }
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Inspect { capture } => {
            let data = load_capture(&capture)?;
            let message = DhcpMessage::decode(&data)?;

            println!("{:<8} {}", "op", message.op);
            println!("{:<8} {}", "htype", message.htype);
            println!("{:<8} {}", "hlen", message.hlen);
            println!("{:<8} {}", "hops", message.hops);
            println!("{:<8} {:#010x}", "xid", message.xid);
            println!("{:<8} {}", "secs", message.secs);
            println!(
                "{:<8} {:#06x}{}",
                "flags",
                message.flags,
                if message.is_broadcast() { " (broadcast)" } else { "" }
            );
            println!("{:<8} {}", "ciaddr", message.ciaddr);
            println!("{:<8} {}", "yiaddr", message.yiaddr);
            println!("{:<8} {}", "siaddr", message.siaddr);
            println!("{:<8} {}", "giaddr", message.giaddr);
            println!("{:<8} {}", "chaddr", message.format_mac());
            println!(
                "{:<8} {} (magic cookie {})",
                "magic",
                hex(&message.magic),
                if message.has_magic_cookie() { "ok" } else { "MISSING" }
            );

            println!();
            println!("Options:");
            match message.option_set() {
                Ok(options) => {
                    for option in options.iter() {
                        let name = OptionCode::try_from(option.code)
                            .map(|code| format!("{:?}", code))
                            .unwrap_or_default();
                        println!("  {:>3} {:<20} {}", option.code, name, hex(&option.data));
                    }
                }
                Err(error) => println!("  unparsable ({}): {}", error, hex(&message.options)),
            }

            let round_trip = message.encode() == data;
            println!();
            println!("Re-encodes identically: {}", round_trip);

            let offer = build_offer(&message, &config.assignment());
            println!();
            println!("OFFER:");
            print!("{}", hexdump(&offer.encode()));
            Ok(())
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect::<Vec<_>>()
        .join(" ")
}
