use std::time::Duration;

use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "kvpaxos-server")]
struct Opt {
    /// Port to listen on for clients and peers
    #[structopt(short = "p", long = "port")]
    port: u16,

    /// Interface to listen on
    #[structopt(short = "H", long = "host", default_value = "127.0.0.1")]
    host: String,

    /// Comma-separated host:port replicas to join through
    #[structopt(short = "b", long = "bootstrap", default_value = "")]
    bootstrap: String,

    /// Timeout for each call to a peer (in milliseconds)
    #[structopt(short = "t", long = "timeout", default_value = "1000")]
    timeout: u64,

    /// Consensus attempts per request before giving up
    #[structopt(short = "r", long = "retries", default_value = "3")]
    retries: usize,

    /// Pause after a lost round (in milliseconds)
    #[structopt(long = "backoff", default_value = "2000")]
    backoff: u64,

    /// Upper bound of random delay added to the pause (in milliseconds)
    #[structopt(long = "jitter", default_value = "250")]
    jitter: u64,

    /// Log more, repeat for even more
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbose: u8,
}

fn logger(verbose: u8) -> Result<(), log::SetLoggerError> {
    let level = match verbose {
    | 0 => log::LevelFilter::Info,
    | 1 => log::LevelFilter::Debug,
    | _ => log::LevelFilter::Trace,
    };
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("[{}][{}] {}", record.level(), record.target(), message))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
}

#[tokio::main]
async fn main() {
    let opt = Opt::from_args();

    if let Err(error) = logger(opt.verbose) {
        eprintln!("failed to install logger: {}", error);
    }

    if opt.port == 0 {
        eprintln!("error: --port must be between 1 and 65535");
        std::process::exit(1);
    }

    let bootstrap = match kvpaxos::ReplicaId::parse_list(&opt.bootstrap) {
    | Ok(bootstrap) => bootstrap,
    | Err(error) => {
        eprintln!("error: {}", error);
        std::process::exit(1);
    }
    };

    let config = kvpaxos::Config::new(opt.host, opt.port)
        .with_bootstrap(bootstrap)
        .with_timeout(Duration::from_millis(opt.timeout))
        .with_retries(opt.retries)
        .with_backoff(Duration::from_millis(opt.backoff))
        .with_jitter(Duration::from_millis(opt.jitter));

    match config.run().await {
    | Ok(running) => running.wait().await,
    | Err(error) => {
        eprintln!("error: failed to start replica: {}", error);
        std::process::exit(1);
    }
    }
}
