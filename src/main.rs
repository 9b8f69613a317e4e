use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::{error, info};

use neurite::data::mnist::PIXELS;
use neurite::train::evaluate;
use neurite::{
    codec, Activation, DirectoryStore, MnistLoader, ModelHub, TrainingConfig, TrainingEvent, TrainingSession,
};

/// Train, evaluate, publish and fetch MNIST digit classifiers.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Train a new network on MNIST and save it.
    Train {
        /// Layer widths, input first
        #[arg(long, value_delimiter = ',', default_values_t = vec![PIXELS, 30, 10])]
        sizes: Vec<usize>,
        #[arg(long, default_value = "sigmoid")]
        activation: Activation,
        #[arg(long, default_value_t = 30)]
        epochs: usize,
        #[arg(long, default_value_t = 3.0)]
        learning_rate: f64,
        #[arg(long, default_value_t = 10)]
        mini_batch_size: usize,
        /// Seeds initialization and shuffling
        #[arg(long)]
        seed: Option<u64>,
        /// Skip the per-epoch test evaluation
        #[arg(long)]
        no_test: bool,
        /// MNIST cache
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
        /// Write a JSONL training journal here
        #[arg(long)]
        journal_dir: Option<PathBuf>,
        #[arg(long, short, default_value = "models/mnist.safetensors")]
        output: PathBuf,
    },
    /// Report a saved model's accuracy on the MNIST test set.
    Evaluate {
        model: PathBuf,
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },
    /// Publish a saved model into a model store.
    Publish {
        model: PathBuf,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Overrides the accuracy recorded in the sidecar
        #[arg(long)]
        accuracy: Option<f64>,
        /// Store directory
        #[arg(long, default_value = "hub")]
        store: PathBuf,
        #[arg(long, default_value = "models/cache")]
        cache_dir: PathBuf,
    },
    /// Copy a published model into the local cache.
    Fetch {
        name: String,
        /// Store directory
        #[arg(long, default_value = "hub")]
        store: PathBuf,
        #[arg(long, default_value = "models/cache")]
        cache_dir: PathBuf,
    },
}

fn train(
    config: TrainingConfig,
    sizes: Vec<usize>,
    activation: Activation,
    data_dir: PathBuf,
    journal_dir: Option<PathBuf>,
    output: PathBuf,
) -> neurite::Result<()> {
    let mut session = match config.seed {
        Some(seed) => TrainingSession::seeded(seed),
        None => TrainingSession::new(),
    };
    if let Some(dir) = journal_dir {
        session = session.with_journal_dir(dir);
    }

    session.set_dataset(MnistLoader::new(data_dir).load()?);
    session.create_network(sizes, activation)?;

    for event in session.start_train(config)? {
        match event? {
            TrainingEvent::Progress(p) => match p.accuracy_percent {
                Some(pct) => info!(
                    "epoch {}/{}: {} / {} ({:.2}%)",
                    p.epoch,
                    p.total_epochs,
                    p.test_accuracy.unwrap_or(0),
                    p.test_total.unwrap_or(0),
                    pct
                ),
                None => info!("epoch {}/{} complete", p.epoch, p.total_epochs),
            },
            TrainingEvent::Completed => info!("training complete"),
        }
    }

    session.save_model(&output)
}

fn run(args: Args) -> neurite::Result<()> {
    match args.command {
        Command::Train {
            sizes,
            activation,
            epochs,
            learning_rate,
            mini_batch_size,
            seed,
            no_test,
            data_dir,
            journal_dir,
            output,
        } => {
            let mut config = TrainingConfig::new(epochs, mini_batch_size, learning_rate);
            config.seed = seed;
            if no_test {
                config = config.without_test_data();
            }
            train(config, sizes, activation, data_dir, journal_dir, output)
        }
        Command::Evaluate { model, data_dir } => {
            let (model, metadata) = codec::load(&model)?;
            let mnist = MnistLoader::new(data_dir).load()?;
            let correct = evaluate(&model, &mnist.test);
            info!(
                "{} / {} correct ({:.2}%)",
                correct,
                mnist.test.len(),
                correct as f64 / mnist.test.len().max(1) as f64 * 100.0
            );
            if let Some(recorded) = metadata.and_then(|m| m.final_accuracy) {
                info!("accuracy recorded at training time: {:.2}%", recorded);
            }
            Ok(())
        }
        Command::Publish { model, name, description, accuracy, store, cache_dir } => {
            let hub = ModelHub::new(DirectoryStore::new(&store), cache_dir);
            let published = hub.publish(&model, &name, &description, accuracy)?;
            info!("wrote {} and {} to {}", published.model, published.metadata, store.display());
            if let Some(readme) = published.readme {
                info!("model card: {}", readme);
            }
            Ok(())
        }
        Command::Fetch { name, store, cache_dir } => {
            let hub = ModelHub::new(DirectoryStore::new(&store), cache_dir);
            let (model, metadata) = hub.fetch(&name)?;
            info!(
                "{} ({:?}, {}) cached at {}",
                name,
                model.sizes(),
                model.activation(),
                hub.cached_path(&name).display()
            );
            if let Some(accuracy) = metadata.and_then(|m| m.final_accuracy) {
                info!("published accuracy: {:.2}%", accuracy);
            }
            Ok(())
        }
    }
}

fn main() -> io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    run(Args::parse()).map_err(|e| {
        error!("{e}");
        io::Error::from(e)
    })
}
