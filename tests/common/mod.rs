//! In-process loopback servers for integration tests

#![allow(dead_code)]

use netpulse::{BenchMode, RunConfig};
use std::io::{Read, Write};
use std::net::{Ipv4Addr, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

pub const REPLY: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n";

/// How a spawned server answers each read
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Reply immediately
    Echo,
    /// Sleep before every reply
    Delayed(Duration),
    /// Reply once, then close the connection
    CloseAfterFirst,
}

/// Spawn a server on an ephemeral loopback port, one thread per connection
pub fn spawn_server(behavior: Behavior) -> u16 {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            thread::spawn(move || serve(stream, behavior));
        }
    });
    port
}

/// Accept exactly one connection and echo on it; later connects fail
pub fn spawn_single_accept_server() -> u16 {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        if let Ok((stream, _)) = listener.accept() {
            drop(listener);
            serve(stream, Behavior::Echo);
        }
    });
    port
}

fn serve(mut stream: TcpStream, behavior: Behavior) {
    stream.set_nodelay(true).unwrap();
    let mut buf = [0u8; 1024];
    loop {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        if let Behavior::Delayed(d) = behavior {
            thread::sleep(d);
        }
        if stream.write_all(REPLY).is_err() {
            return;
        }
        if let Behavior::CloseAfterFirst = behavior {
            return;
        }
    }
}

pub fn config(port: u16, mode: BenchMode, w: u32, c: u32, r: u32, delay_ns: u64) -> RunConfig {
    RunConfig {
        mode,
        workers: w,
        connections_per_worker: c,
        requests_per_connection: r,
        delay_ns,
        ..RunConfig::new(Ipv4Addr::LOCALHOST, port)
    }
}
