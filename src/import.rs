use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use crate::csv_codec;
use crate::domain::TMError;
use crate::record::Record;

pub enum ImportPoll {
    Pending,
    Done(Result<Vec<Record>, TMError>),
    TimedOut,
}

/// A CSV file being read and decoded on the rayon pool.
///
/// The read itself can not be interrupted; cancelling or timing out only
/// discards whatever the worker delivers later.
pub struct ImportTask {
    path: PathBuf,
    receiver: Receiver<Result<Vec<Record>, TMError>>,
    canceled: Arc<AtomicBool>,
    started: Instant,
    timeout: Duration,
}

impl ImportTask {
    pub fn spawn(path: PathBuf, timeout: Duration) -> Self {
        let (sender, receiver) = mpsc::channel();
        let canceled = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&canceled);
        let worker_path = path.clone();
        rayon::spawn(move || {
            let start_time = Instant::now();
            let result = read_and_decode(&worker_path);
            if flag.load(Ordering::Acquire) {
                trace!("Dropping result of canceled import {:?}", worker_path);
                return;
            }
            info!(
                "Import of {:?} finished in {}ms",
                worker_path,
                start_time.elapsed().as_millis()
            );
            if sender.send(result).is_err() {
                trace!("Import of {:?} finished after its task was dropped", worker_path);
            }
        });

        debug!("Started import of {:?}", path);
        Self {
            path,
            receiver,
            canceled,
            started: Instant::now(),
            timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn poll(&self) -> ImportPoll {
        match self.receiver.try_recv() {
            Ok(result) => ImportPoll::Done(result),
            Err(TryRecvError::Empty) if self.started.elapsed() >= self.timeout => {
                self.canceled.store(true, Ordering::Release);
                ImportPoll::TimedOut
            }
            Err(TryRecvError::Empty) => ImportPoll::Pending,
            Err(TryRecvError::Disconnected) => ImportPoll::Done(Err(TMError::LoadingFailed(
                "import worker stopped unexpectedly".into(),
            ))),
        }
    }

    pub fn cancel(self) {
        self.canceled.store(true, Ordering::Release);
        debug!("Canceled import of {:?}", self.path);
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

fn read_and_decode(path: &Path) -> Result<Vec<Record>, TMError> {
    let bytes = fs::read(path)?;
    let content = String::from_utf8(bytes).map_err(|e| TMError::ImportFormat(e.to_string()))?;
    csv_codec::decode(&content)
}
