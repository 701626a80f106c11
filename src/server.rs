use std::io::{self, BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use crossbeam_channel::{unbounded, Sender};
use thiserror::Error;

use crate::effectspec::parse_effect;
use crate::queue::{EffectQueue, Interrupter, PushOutcome, QueueError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// One connection at a time, handled on the listener thread.
    Serial,
    /// A thread per connection, all sharing the one queue.
    Concurrent,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("listener failed: {0}")]
    Listener(#[from] io::Error),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

pub struct ControlServer<W: Write + Send + 'static> {
    listener: TcpListener,
    queue: Arc<Mutex<EffectQueue<W>>>,
    interrupter: Interrupter,
    dispatch: Dispatch,
    preempt: bool,
}

impl<W: Write + Send + 'static> ControlServer<W> {
    pub fn bind(
        addr: &str,
        queue: Arc<Mutex<EffectQueue<W>>>,
        dispatch: Dispatch,
        preempt: bool,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)?;
        let interrupter = lock(&*queue).interrupter();

        if preempt && dispatch == Dispatch::Serial {
            log::warn!("Preemption only applies to async dispatch");
        }

        Ok(ControlServer {
            listener,
            queue,
            interrupter,
            dispatch,
            preempt,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves connections until something fatal happens: the listener breaks
    /// or the light driver stops accepting frames.
    pub fn run(self) -> Result<(), ServerError> {
        let (failures_tx, failures_rx) = unbounded();
        let listener_failures = failures_tx.clone();

        thread::Builder::new()
            .name("Listener".to_string())
            .spawn(move || {
                if let Err(err) = self.accept_loop(failures_tx) {
                    let _ = listener_failures.send(err);
                }
            })?;

        match failures_rx.recv() {
            Ok(err) => Err(err),
            Err(_) => Ok(()),
        }
    }

    fn accept_loop(&self, failures: Sender<ServerError>) -> Result<(), ServerError> {
        log::info!("Listening on {}", self.local_addr()?);

        for stream in self.listener.incoming() {
            let stream = stream?;
            let peer = stream
                .peer_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "unknown peer".to_string());
            log::info!("Connection from {peer}");

            match self.dispatch {
                Dispatch::Serial => {
                    handle_connection(stream, &*self.queue, &self.interrupter, false)?;
                }
                Dispatch::Concurrent => {
                    let queue = Arc::clone(&self.queue);
                    let interrupter = self.interrupter.clone();
                    let preempt = self.preempt;
                    let failures = failures.clone();
                    let res = thread::Builder::new()
                        .name(format!("Connection {peer}"))
                        .spawn(move || {
                            let res = handle_connection(stream, &*queue, &interrupter, preempt);
                            if let Err(err) = res {
                                let _ = failures.send(err.into());
                            }
                        });
                    if let Err(err) = res {
                        log::error!("Failed to create connection thread: {err}");
                    }
                }
            }
        }

        Ok(())
    }
}

fn lock<W: Write>(queue: &Mutex<EffectQueue<W>>) -> std::sync::MutexGuard<'_, EffectQueue<W>> {
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Plays every effect line sent over `stream`. Bad input ends the connection
/// quietly; only a failing light driver is reported back as an error.
fn handle_connection<W: Write>(
    stream: TcpStream,
    queue: &Mutex<EffectQueue<W>>,
    interrupter: &Interrupter,
    preempt: bool,
) -> Result<(), QueueError> {
    let reader = BufReader::new(stream);

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                log::warn!("Unable to read from connection: {err}");
                return Ok(());
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let effect = match parse_effect(line) {
            Ok(effect) => effect,
            Err(err) => {
                log::warn!("Unable to process effect: {err}");
                return Ok(());
            }
        };
        log::info!("Playing {line}");

        // Taken before waiting for the queue, so a later preempt also skips us.
        let ticket = if preempt {
            interrupter.preempt()
        } else {
            interrupter.ticket()
        };
        if lock(queue).push_with(ticket, &effect)? == PushOutcome::Skipped {
            log::info!("Dropped {line}, a newer effect took over");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::net::TcpStream;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::sink::testing::{BrokenSink, RecordingSink};

    fn start<W: Write + Send + 'static>(
        sink: W,
        dispatch: Dispatch,
        preempt: bool,
    ) -> (SocketAddr, thread::JoinHandle<Result<(), ServerError>>) {
        let queue = Arc::new(Mutex::new(EffectQueue::new(sink)));
        let server = ControlServer::bind("127.0.0.1:0", queue, dispatch, preempt).unwrap();
        let addr = server.local_addr().unwrap();
        (addr, thread::spawn(move || server.run()))
    }

    fn send(addr: SocketAddr, text: &str) {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(text.as_bytes()).unwrap();
    }

    fn wait_for_lines(sink: &RecordingSink, count: usize) -> Vec<String> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let lines = sink.lines();
            if lines.len() >= count || Instant::now() > deadline {
                return lines;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn lines_are_played_in_order() {
        let sink = RecordingSink::new();
        let (addr, _server) = start(sink.clone(), Dispatch::Serial, false);

        send(addr, "c{1,2,3}\n\nflash{5ms|255,0,0|1}\n");
        assert_eq!(
            wait_for_lines(&sink, 3),
            vec!["1 2 3", "255 0 0", "0 0 0"]
        );
    }

    #[test]
    fn bad_line_ends_only_that_connection() {
        let sink = RecordingSink::new();
        let (addr, _server) = start(sink.clone(), Dispatch::Serial, false);

        send(addr, "c{1,1,1}\nstrobe{1,2,3}\nc{2,2,2}\n");
        send(addr, "c{3,3,3}\n");
        assert_eq!(wait_for_lines(&sink, 2), vec!["1 1 1", "3 3 3"]);
    }

    #[test]
    fn async_connections_share_the_light() {
        let sink = RecordingSink::new();
        let (addr, _server) = start(sink.clone(), Dispatch::Concurrent, false);

        send(addr, "flash{10ms|5,5,5|2}\n");
        send(addr, "flash{10ms|6,6,6|2}\n");

        let lines = wait_for_lines(&sink, 8);
        assert_eq!(lines.len(), 8);
        for run in lines.chunks(4) {
            assert_eq!(run[0], run[2]);
            assert_eq!(run[1], "0 0 0");
            assert_eq!(run[3], "0 0 0");
        }
    }

    #[test]
    fn preempting_replaces_an_endless_effect() {
        let sink = RecordingSink::new();
        let (addr, _server) = start(sink.clone(), Dispatch::Concurrent, true);

        send(addr, "flash{20ms|255,255,255|-1}\n");
        wait_for_lines(&sink, 2);
        send(addr, "c{1,1,1}\n");

        let deadline = Instant::now() + Duration::from_secs(5);
        while sink.lines().last().map(String::as_str) != Some("1 1 1") {
            assert!(Instant::now() < deadline, "light never went off");
            thread::sleep(Duration::from_millis(10));
        }
        let settled = sink.lines().len();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(sink.lines().len(), settled);
    }

    #[test]
    fn preempting_outlasts_several_endless_effects() {
        let sink = RecordingSink::new();
        let (addr, _server) = start(sink.clone(), Dispatch::Concurrent, true);

        send(addr, "flash{10ms|255,255,255|-1}\n");
        send(addr, "flash{10ms|200,200,200|-1}\n");
        wait_for_lines(&sink, 2);
        thread::sleep(Duration::from_millis(100));
        send(addr, "c{1,1,1}\n");

        let deadline = Instant::now() + Duration::from_secs(2);
        while sink.lines().last().map(String::as_str) != Some("1 1 1") {
            assert!(Instant::now() < deadline, "endless flash kept the light");
            thread::sleep(Duration::from_millis(10));
        }
        let settled = sink.lines().len();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(sink.lines().len(), settled);
    }

    #[test]
    fn broken_driver_stops_the_server() {
        let (addr, server) = start(BrokenSink, Dispatch::Serial, false);
        send(addr, "c{1,2,3}\n");

        let result = server.join().unwrap();
        assert!(matches!(result, Err(ServerError::Queue(QueueError::Sink(_)))));
    }
}
