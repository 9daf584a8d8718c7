use clap::{Parser, Subcommand};
use gridmill_core::{Combiner, Job, Splitter};
use gridmill_net::Messenger;
use gridmill_node::{default_config_path, load_worker_config, Master, Worker};
use gridmill_proto::DEFAULT_PORT;
use serde::Deserialize;
use std::error::Error;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "gridmill",
    about = "A small distributed job-execution cluster",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a master node.
    Master {
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Run a worker node.
    Worker {
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Worker configuration; defaults to
        /// config/<hostname>-slave-config.json.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Submit a job document to a master and wait for the acknowledgment.
    Submit {
        /// Path to the job document.
        #[arg(short, long)]
        job: PathBuf,
        /// Master address.
        #[arg(short, long, default_value = "127.0.0.1:33310")]
        dest: SocketAddr,
    },
}

/// The on-disk job document: input data, a processor, and optional split /
/// combine callables (the defaults split on newlines and sum).
#[derive(Debug, Deserialize)]
struct JobFile {
    input_data: serde_json::Value,
    processor: String,
    #[serde(default)]
    split: Option<String>,
    #[serde(default)]
    combine: Option<String>,
    #[serde(default)]
    retries: u32,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Master { port } => {
            let mut master = Master::bind(port)?;
            master.run()?;
            Ok(())
        }
        Command::Worker { port, config } => {
            let path = config.unwrap_or_else(default_config_path);
            let config = load_worker_config(&path)?;
            let mut worker = Worker::bind(port, &config)?;
            worker.run()?;
            Ok(())
        }
        Command::Submit { job, dest } => submit(&job, dest),
    }
}

fn submit(path: &Path, dest: SocketAddr) -> Result<(), Box<dyn Error>> {
    let text = std::fs::read_to_string(path)?;
    let jobfile: JobFile = serde_json::from_str(&text)?;
    let job = Job::new(
        jobfile.input_data,
        &jobfile.processor,
        jobfile.split.as_deref().map(Splitter::custom),
        jobfile.combine.as_deref().map(Combiner::custom),
        jobfile.retries,
    );

    // The submitter binds an ephemeral port; only masters and workers own
    // the cluster port.
    let messenger = Messenger::bind(0)?;
    let tracker = messenger
        .send_job(&job, dest, true)?
        .ok_or("job send was not tracked")?;
    info!("submitted job {} to {}", job.id, dest);
    while !tracker.is_acked() {
        thread::sleep(Duration::from_secs(2));
    }
    println!("job {} accepted by {}", job.id, dest);
    Ok(())
}
