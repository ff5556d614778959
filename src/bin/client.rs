use std::time::Duration;

use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "kvpaxos-client")]
struct Opt {
    /// Replica to send the request to, as host:port
    #[structopt(short = "r", long = "replica")]
    replica: kvpaxos::ReplicaId,

    /// Time to wait for the reply (in milliseconds). Defaults to a bit
    /// more than the longest a replica with default settings needs to
    /// give up on a request.
    #[structopt(short = "t", long = "timeout")]
    timeout: Option<u64>,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt)]
enum Command {
    /// Store a value under a key
    Put { key: String, value: String },

    /// Read the value under a key
    Get { key: String },

    /// Remove a key
    Delete { key: String },
}

#[tokio::main]
async fn main() {
    let opt = Opt::from_args();
    let timeout = opt.timeout
        .map(Duration::from_millis)
        .unwrap_or_else(|| kvpaxos::Proposer::default().worst_case() + Duration::from_secs(1));
    let client = kvpaxos::Client::new(opt.replica, timeout);

    let response = match opt.command {
    | Command::Put { key, value } => client.put(key, value).await,
    | Command::Get { key } => client.get(key).await,
    | Command::Delete { key } => client.delete(key).await,
    };

    match response {
    | Ok(response) => {
        match &response.value {
        | Some(value) => println!("{:?} {}: {}", response.kind, response.message, value),
        | None => println!("{:?} {}", response.kind, response.message),
        }
        if !response.is_ok() {
            std::process::exit(2);
        }
    }
    | Err(error) => {
        eprintln!("error: {}: {}", client.replica(), error);
        std::process::exit(1);
    }
    }
}
