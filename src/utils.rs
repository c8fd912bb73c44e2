use std::{
    fs::OpenOptions,
    io::Write,
    net::UdpSocket,
    time::{SystemTime, UNIX_EPOCH},
};

use crate::error::DroneError;

pub fn fatal(message: &str) -> ! {
    tracing::error!(message);
    std::process::exit(-1);
}

pub fn udp_sock(bind_addr: &str) -> Result<UdpSocket, DroneError> {
    UdpSocket::bind(bind_addr).map_err(|e| {
        tracing::error!("can't create udp socket for {bind_addr} : {e}");
        DroneError::Io(e)
    })
}

pub fn udp_sock_clone(s: &UdpSocket) -> UdpSocket {
    match s.try_clone() {
        Ok(s) => s,
        Err(e) => fatal(&format!("can't clone socket: {e}")),
    }
}

pub fn now_secs() -> u64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(tm) => tm.as_secs(),
        Err(_) => fatal("can't obtain time"),
    }
}

pub fn append_to_file(path: &str, buffer: &[u8]) {
    let file = OpenOptions::new().create(true).append(true).open(path);
    let mut file = match file {
        Ok(f) => f,
        Err(e) => {
            tracing::error!("can't open {path} for append: {e}");
            return;
        }
    };

    if let Err(e) = file.write_all(buffer) {
        tracing::error!("error writing to file {path}: {e}");
    }
}

/// Directory path that is guaranteed to end with `/`.
pub fn dir_with_slash(dir: &str) -> String {
    if dir.ends_with('/') {
        dir.to_owned()
    } else {
        format!("{dir}/")
    }
}

/// Converts RGB pixels to the `0RGB` u32 layout used by the window buffer.
pub fn rgb_to_0rgb(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | (b as u32)
}
