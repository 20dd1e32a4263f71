//! Serial transport over a Linux tty device.
//!
//! Opens the device node read-write, switches the line to raw mode and maps
//! the transport timeout onto termios `VTIME` (inter-byte, in tenths of a
//! second, capped at 25.5s). The device enumerates over USB as a CDC-ACM
//! port (`/dev/ttyACM0`) or sits on a real UART (`/dev/ttyS*`).

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::time::Duration;

use super::Transport;

/// Serial byte channel for `/dev/tty*` device nodes.
pub struct TtyTransport {
    file: Option<File>,
    endpoint: String,
}

impl TtyTransport {
    pub fn new() -> Self {
        Self {
            file: None,
            endpoint: String::new(),
        }
    }

    fn file_mut(&mut self) -> io::Result<&mut File> {
        self.file.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "serial port not connected")
        })
    }
}

impl Default for TtyTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for TtyTransport {
    fn connect(&mut self, endpoint: &str, baud: u32, timeout: Duration) -> io::Result<()> {
        let file = OpenOptions::new().read(true).write(true).open(endpoint)?;
        configure_tty(&file, baud, timeout)?;
        log::info!("serial: connected to {} at {} baud", endpoint, baud);
        self.endpoint = endpoint.to_string();
        self.file = Some(file);
        Ok(())
    }

    fn disconnect(&mut self) -> io::Result<()> {
        if self.file.take().is_some() {
            log::info!("serial: disconnected from {}", self.endpoint);
        }
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        let file = self.file_mut()?;
        file.write_all(bytes)?;
        file.flush()
    }

    fn receive(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let file = self.file_mut()?;
        let mut buf = vec![0u8; n];
        let mut filled = 0;
        while filled < n {
            let read = file.read(&mut buf[filled..])?;
            if read == 0 {
                // VTIME expired with no byte in flight.
                break;
            }
            filled += read;
        }
        buf.truncate(filled);
        Ok(buf)
    }

    fn clear_receive_buffer(&mut self) -> io::Result<()> {
        let fd = self.file_mut()?.as_raw_fd();
        if unsafe { libc::tcflush(fd, libc::TCIFLUSH) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

fn configure_tty(file: &File, baud: u32, timeout: Duration) -> io::Result<()> {
    let fd = file.as_raw_fd();
    let speed = baud_constant(baud).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unsupported baud rate {}", baud),
        )
    })?;

    let mut tio = unsafe { std::mem::zeroed::<libc::termios>() };
    if unsafe { libc::tcgetattr(fd, &mut tio) } != 0 {
        return Err(io::Error::last_os_error());
    }

    unsafe { libc::cfmakeraw(&mut tio) };
    if unsafe { libc::cfsetispeed(&mut tio, speed) } != 0
        || unsafe { libc::cfsetospeed(&mut tio, speed) } != 0
    {
        return Err(io::Error::last_os_error());
    }

    // Blocking read with an inter-byte deadline: VMIN=0 makes VTIME an
    // absolute timeout for the first byte of each read().
    let deciseconds = (timeout.as_millis() / 100).clamp(1, 255) as libc::cc_t;
    tio.c_cc[libc::VMIN] = 0;
    tio.c_cc[libc::VTIME] = deciseconds;

    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &tio) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn baud_constant(baud: u32) -> Option<libc::speed_t> {
    match baud {
        9600 => Some(libc::B9600),
        38400 => Some(libc::B38400),
        115_200 => Some(libc::B115200),
        230_400 => Some(libc::B230400),
        460_800 => Some(libc::B460800),
        921_600 => Some(libc::B921600),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baud_constants_cover_the_device_set() {
        for baud in crate::wire::AVAILABLE_BAUD {
            assert!(baud_constant(baud).is_some(), "{} baud", baud);
        }
        assert!(baud_constant(57_600).is_none());
    }

    #[test]
    fn send_before_connect_is_rejected() {
        let mut port = TtyTransport::new();
        let err = port.send(&[0xFE]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }
}
