use std::any::Any;
use std::mem;
use std::path::PathBuf;
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{error, warn};
use parking_lot::{Mutex, RwLock};

use crate::data::Mnist;
use crate::error::{Error, Result};
use crate::network::NetworkModel;
use crate::session::guard::TrainingGuard;
use crate::train::{
    LoggedTrainer, ModelAccess, SgdTrainer, Trainer, TrainingConfig, TrainingEvent, TrainingJournal,
    TrainingProgress,
};

/// Progress records buffered between the worker and a slow consumer.
const PROGRESS_BUFFER: usize = 16;

/// Outcome of the most recent completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    /// The config the run used, with its effective seed filled in.
    pub config: TrainingConfig,
    pub history: Vec<TrainingProgress>,
    pub final_accuracy: Option<f64>,
}

/// A network shared with concurrent readers.
///
/// The write lock is taken once per call and released before the next, so
/// readers interleave between mini-batches.
pub(crate) struct SharedNetwork(pub(crate) Arc<RwLock<NetworkModel>>);

impl ModelAccess for SharedNetwork {
    fn update<T>(&mut self, f: impl FnOnce(&mut NetworkModel) -> T) -> T {
        let out = {
            let mut model = self.0.write();
            f(&mut *model)
        };
        thread::yield_now();
        out
    }

    fn read<T>(&self, f: impl FnOnce(&NetworkModel) -> T) -> T {
        let model = self.0.read();
        f(&*model)
    }
}

/// Everything a training worker needs, captured when the run is started.
pub(crate) struct TrainingJob {
    pub(crate) guard: TrainingGuard,
    pub(crate) model: Arc<RwLock<NetworkModel>>,
    pub(crate) data: Arc<Mnist>,
    pub(crate) config: TrainingConfig,
    pub(crate) journal_dir: Option<PathBuf>,
    pub(crate) last_run: Arc<Mutex<Option<RunRecord>>>,
}

impl TrainingJob {
    fn run(self, tx: SyncSender<TrainingEvent>) {
        let TrainingJob { guard, model, data, config, journal_dir, last_run } = self;
        let mut access = SharedNetwork(model);
        let test = Some(data.test.as_slice());
        let send = |p: &TrainingProgress| {
            // A gone consumer does not stop the run.
            let _ = tx.send(TrainingEvent::Progress(p.clone()));
        };

        let trainer = SgdTrainer::for_config(&config);
        let journal = journal_dir.and_then(|dir| match TrainingJournal::create(&dir) {
            Ok(journal) => Some(journal),
            Err(e) => {
                warn!("training journal disabled, cannot open {}: {}", dir.display(), e);
                None
            }
        });
        let history = match journal {
            Some(journal) => {
                LoggedTrainer::new(trainer, journal).train(&mut access, &data.training, test, &config, send)
            }
            None => {
                let mut trainer = trainer;
                trainer.train(&mut access, &data.training, test, &config, send)
            }
        };

        let final_accuracy = history.last().and_then(|p| p.accuracy_percent);
        *last_run.lock() = Some(RunRecord { config, history, final_accuracy });

        drop(guard);
        let _ = tx.send(TrainingEvent::Completed);
    }
}

enum StreamState {
    Pending(Box<TrainingJob>),
    Running {
        rx: Receiver<TrainingEvent>,
        handle: JoinHandle<()>,
    },
    Done,
}

/// What [`TrainingStream::next_timeout`] saw.
#[derive(Debug)]
pub enum StreamPoll {
    Event(Result<TrainingEvent>),
    /// Nothing arrived in time; the run is still going.
    Idle,
    Finished,
}

/// Progress of one training run: a `Progress` item per epoch, then
/// `Completed`.
///
/// The worker thread starts on the first call to `next`. Dropping the stream
/// before that releases the session; dropping it afterwards leaves the worker
/// running to completion. If the worker dies, the last item is
/// `Err(TrainingFailed)`.
pub struct TrainingStream {
    state: StreamState,
}

impl TrainingStream {
    pub(crate) fn new(job: TrainingJob) -> Self {
        TrainingStream { state: StreamState::Pending(Box::new(job)) }
    }

    fn spawn(job: Box<TrainingJob>) -> Result<StreamState> {
        let (tx, rx) = sync_channel(PROGRESS_BUFFER);
        let handle = thread::Builder::new()
            .name("trainer".into())
            .spawn(move || job.run(tx))?;
        Ok(StreamState::Running { rx, handle })
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "training worker panicked".to_owned()
    }
}

impl TrainingStream {
    /// Like `next`, but gives up after `timeout` with [`StreamPoll::Idle`].
    pub fn next_timeout(&mut self, timeout: Duration) -> StreamPoll {
        self.wait(Some(timeout))
    }

    fn wait(&mut self, timeout: Option<Duration>) -> StreamPoll {
        match mem::replace(&mut self.state, StreamState::Done) {
            StreamState::Pending(job) => match TrainingStream::spawn(job) {
                Ok(running) => {
                    self.state = running;
                    self.wait(timeout)
                }
                Err(e) => StreamPoll::Event(Err(e)),
            },
            StreamState::Running { rx, handle } => {
                let received = match timeout {
                    Some(timeout) => rx.recv_timeout(timeout),
                    None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
                };
                match received {
                    Ok(TrainingEvent::Completed) => {
                        let _ = handle.join();
                        StreamPoll::Event(Ok(TrainingEvent::Completed))
                    }
                    Ok(event) => {
                        self.state = StreamState::Running { rx, handle };
                        StreamPoll::Event(Ok(event))
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        self.state = StreamState::Running { rx, handle };
                        StreamPoll::Idle
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        let detail = match handle.join() {
                            Err(payload) => panic_message(payload),
                            Ok(()) => "training worker exited before completing".to_owned(),
                        };
                        error!("training failed: {}", detail);
                        StreamPoll::Event(Err(Error::TrainingFailed(detail)))
                    }
                }
            }
            StreamState::Done => StreamPoll::Finished,
        }
    }
}

impl Iterator for TrainingStream {
    type Item = Result<TrainingEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.wait(None) {
                StreamPoll::Event(item) => return Some(item),
                StreamPoll::Finished => return None,
                StreamPoll::Idle => continue,
            }
        }
    }
}
