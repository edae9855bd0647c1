use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use anyhow::{Context, Result};
use crossbeam_channel::{Sender, TrySendError};

use crate::types::{ColorFrame, RawDepthFrame, Skeleton};

// Give up on a source that keeps failing instead of spinning on it.
const MAX_CONSECUTIVE_READ_ERRORS: u32 = 30;

#[derive(Clone, Debug)]
pub enum SensorFrame {
    Color(ColorFrame),
    Depth(RawDepthFrame),
    Skeletons(Vec<Skeleton>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlSignal {
    Click,
    WindowActive(bool),
    Shutdown,
}

#[derive(Clone, Debug)]
pub enum SensorEvent {
    Frame(SensorFrame),
    Control(ControlSignal),
}

/// Anything that can produce sensor events: a device runtime, a recording,
/// or the synthetic generator.
pub trait SensorSource: Send + 'static {
    fn label(&self) -> String;

    /// Blocks until the next event is available. `Ok(None)` means the source
    /// is exhausted.
    fn next_event(&mut self) -> Result<Option<SensorEvent>>;
}

#[derive(Debug)]
pub struct SensorStream {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SensorStream {
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SensorStream {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Pumps events from `source` on a dedicated thread.
///
/// Frames go through `frame_tx` and are dropped when the consumer is busy.
/// Control signals go through `control_tx` and are never dropped.
pub fn start_sensor_stream<S: SensorSource>(
    mut source: S,
    frame_tx: Sender<SensorFrame>,
    control_tx: Sender<ControlSignal>,
) -> Result<SensorStream> {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();
    let label = source.label();

    let handle = thread::Builder::new()
        .name("sensor-stream".to_string())
        .spawn(move || {
            log::info!("sensor stream started: {label}");
            let mut consecutive_errors = 0;

            while !stop_flag.load(Ordering::Relaxed) {
                let event = match source.next_event() {
                    Ok(Some(event)) => {
                        consecutive_errors = 0;
                        event
                    }
                    Ok(None) => {
                        log::info!("sensor source {label} exhausted");
                        break;
                    }
                    Err(err) => {
                        consecutive_errors += 1;
                        log::warn!("sensor read failed: {err:?}");
                        if consecutive_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                            log::error!("sensor {label} keeps failing, stopping stream");
                            break;
                        }
                        continue;
                    }
                };

                match event {
                    SensorEvent::Frame(frame) => match frame_tx.try_send(frame) {
                        Ok(()) => {}
                        // Drop if the worker is busy.
                        Err(TrySendError::Full(_)) => {
                            log::debug!("frame queue full, dropping frame")
                        }
                        Err(TrySendError::Disconnected(_)) => break,
                    },
                    SensorEvent::Control(signal) => {
                        let shutdown = signal == ControlSignal::Shutdown;
                        if control_tx.send(signal).is_err() || shutdown {
                            break;
                        }
                    }
                }
            }

            log::info!("sensor stream stopped: {label}");
        })
        .context("failed to spawn sensor stream thread")?;

    Ok(SensorStream {
        stop,
        handle: Some(handle),
    })
}
