use std::io::{self, Write};
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::color::{sink_line, Color};

/// Writes one frame as a single `"R G B\n"` line and flushes it, so the driver
/// never sees half a frame.
pub fn write_frame<W: Write>(sink: &mut W, color: Color) -> io::Result<()> {
    let line = sink_line(color);
    sink.write_all(line.as_bytes())?;
    sink.flush()
}

/// The light driver running as a child process that reads frames on stdin.
pub struct DriverSink {
    child: Child,
    stdin: Option<ChildStdin>,
}

impl DriverSink {
    pub fn spawn(command: &[String]) -> io::Result<DriverSink> {
        let (program, args) = command.split_first().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "empty driver command")
        })?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .spawn()?;
        let stdin = child.stdin.take();
        log::info!("Started driver `{}` (pid {})", command.join(" "), child.id());

        Ok(DriverSink { child, stdin })
    }

    fn stdin(&mut self) -> io::Result<&mut ChildStdin> {
        self.stdin
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "driver stdin closed"))
    }
}

impl Write for DriverSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stdin()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stdin()?.flush()
    }
}

impl Drop for DriverSink {
    fn drop(&mut self) {
        // Closing stdin tells the driver to finish.
        drop(self.stdin.take());
        match self.child.wait() {
            Ok(status) => log::info!("Driver exited: {status}"),
            Err(err) => log::error!("Cannot reap driver: {err}"),
        }
    }
}

/// Opens the configured driver; `-` prints frames to stdout instead.
pub fn open(command: &[String]) -> io::Result<Box<dyn Write + Send>> {
    if let [only] = command {
        if only == "-" {
            log::info!("Writing frames to stdout");
            return Ok(Box::new(io::stdout()));
        }
    }

    Ok(Box::new(DriverSink::spawn(command)?))
}
