use std::io::Read;
use std::path::PathBuf;
use std::process;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};

use scrapscript::yards::{self, CachingFetcher, Fetcher, HttpYard, Pusher, Validate};
use scrapscript::Environment;

#[derive(Parser, Debug)]
#[command(name = "scrap")]
#[command(about = "Run scrapscript programs from stdin")]
struct Cli {
    /// The HTTP yard to fetch imports from and push scraps to.
    #[arg(long, default_value = "https://scraps.oseg.dev/")]
    yard: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a program and print its value in source form.
    Eval {
        /// `apply <expr>` applies the result to a second expression.
        #[arg(trailing_var_arg = true)]
        args: Vec<String>,
    },
    /// Print a program's inferred type.
    Type,
    /// Push a program to the yard and print its key.
    Push,
    /// Print the SHA-256 hex of the input without executing it.
    Hash,
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("{err}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut input = Vec::new();
    std::io::stdin()
        .read_to_end(&mut input)
        .context("reading stdin")?;

    match cli.cmd {
        Command::Eval { args } => {
            let mut env = make_env(&cli.yard)?;
            let key = env.read(&input).map_err(|e| anyhow!("{e}"))?;
            let mut val = env.eval(&key).map_err(|e| anyhow!("{e}"))?;

            match args.split_first() {
                None => {}
                Some((word, rest)) if word == "apply" && rest.len() == 1 => {
                    let key = env.read(rest[0].as_bytes()).map_err(|e| anyhow!("{e}"))?;
                    let fun = env.eval(&key).map_err(|e| anyhow!("{e}"))?;
                    val = env.call(&fun, val).map_err(|e| anyhow!("{e}"))?;
                }
                Some(_) => bail!("usage: scrap eval [apply <expr>]"),
            }

            println!("{}", env.scrap(&val));
        }

        Command::Type => {
            let mut env = make_env(&cli.yard)?;
            let key = env.read(&input).map_err(|e| anyhow!("{e}"))?;
            let typ = env.infer(&key).map_err(|e| anyhow!("{e}"))?;
            println!("{}", env.type_string(typ));
        }

        Command::Push => {
            let yard = HttpYard::new(&cli.yard);
            let key = yard.push_scrap(&input).context("pushing scrap")?;
            println!("{key}");
        }

        Command::Hash => {
            println!("{}", yards::sha256_hex(&input));
        }
    }

    Ok(())
}

fn make_env(yard: &str) -> anyhow::Result<Environment> {
    let mut env = Environment::new();
    // Don't cache invalid scraps, but trust the local cache.
    let remote = Validate(HttpYard::new(yard));
    let fetcher: Box<dyn Fetcher> = match cache_dir() {
        Some(dir) => Box::new(CachingFetcher::new(dir, Box::new(remote))?),
        None => Box::new(remote),
    };
    env.use_fetcher(fetcher);
    Ok(env)
}

fn cache_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os("XDG_CACHE_HOME") {
        return Some(PathBuf::from(dir).join("scrapscript/sha256"));
    }
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache/scrapscript/sha256"))
}
