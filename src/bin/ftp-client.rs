//! Non-interactive FTP client: connect, log in, run one operation, quit.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};
use std::path::PathBuf;

use ftp_engine::FtpClient;
use ftp_engine::error::ClientError;

#[derive(Parser, Debug)]
#[command(name = "ftp-client", about = "Runs one FTP operation against a server.")]
struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(short, long, default_value_t = 2121)]
    port: u16,

    #[arg(short, long)]
    user: String,

    #[arg(long, env = "FTP_PASSWORD")]
    password: String,

    #[command(subcommand)]
    operation: Operation,
}

#[derive(Subcommand, Debug)]
enum Operation {
    /// List the remote working directory
    Ls {
        /// Change into this directory first
        dir: Option<String>,
    },
    /// Download a remote file
    Get {
        remote: String,
        /// Local destination (defaults to the remote name)
        local: Option<PathBuf>,
    },
    /// Upload a local file
    Put {
        local: PathBuf,
        /// Remote name (defaults to the local file name)
        remote: Option<String>,
    },
    /// Print the remote working directory
    Pwd,
    /// Change directory, then print the new working directory
    Cd { dir: String },
    /// Print the server's system type
    Syst,
}

fn report(verb: &str, name: &str, bytes: u64, millis: u64, rate: f64) {
    println!(
        "{} {}: {} bytes in {:.2} s ({:.2} KB/s)",
        verb,
        name,
        bytes,
        millis as f64 / 1000.0,
        rate
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    Builder::from_env(Env::default().default_filter_or("warn")).init();

    let mut client = FtpClient::connect((args.host.as_str(), args.port))
        .await
        .with_context(|| format!("failed to connect to {}:{}", args.host, args.port))?;
    client
        .login(&args.user, &args.password)
        .await
        .context("authentication failed")?;

    match args.operation {
        Operation::Ls { dir } => {
            if let Some(dir) = dir {
                client.cwd(&dir).await.context("CWD failed")?;
            }
            let (lines, result) = client.list().await.context("LIST failed")?;
            for line in &lines {
                println!("{}", line);
            }
            println!(
                "Total: {} bytes ({:.2} s)",
                result.bytes,
                result.duration.as_secs_f64()
            );
        }
        Operation::Get { remote, local } => {
            let local = local.unwrap_or_else(|| PathBuf::from(&remote));
            match client.download_file(&remote, &local).await {
                Ok(result) => report(
                    "Downloaded",
                    &remote,
                    result.bytes,
                    result.duration_ms(),
                    result.kib_per_sec(),
                ),
                Err(ClientError::EmptyTransfer(name)) => {
                    bail!("{} is empty or could not be downloaded", name)
                }
                Err(e) => return Err(e).context("RETR failed"),
            }
        }
        Operation::Put { local, remote } => {
            let remote = match remote {
                Some(remote) => remote,
                None => local
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .context("local path has no file name")?,
            };
            match client.upload_file(&local, &remote).await {
                Ok(result) => report(
                    "Uploaded",
                    &remote,
                    result.bytes,
                    result.duration_ms(),
                    result.kib_per_sec(),
                ),
                Err(ClientError::EmptyTransfer(name)) => {
                    bail!("{} could not be uploaded (no bytes sent)", name)
                }
                Err(e) => return Err(e).context("STOR failed"),
            }
        }
        Operation::Pwd => println!("{}", client.pwd().await.context("PWD failed")?),
        Operation::Cd { dir } => {
            client.cwd(&dir).await.context("CWD failed")?;
            println!("{}", client.pwd().await.context("PWD failed")?);
        }
        Operation::Syst => println!("{}", client.system().await.context("SYST failed")?),
    }

    client.quit().await.context("QUIT failed")?;
    Ok(())
}
