//! A device served over a Unix domain socket, with a client in the same
//! process.
//!
//! Run with:
//!   cargo run --example uds-device
//!
//! Or keep the device running and talk to it from the CLI:
//!   cargo run --features cli -- send /tmp/cmdwire-uds-device-<pid>/device.sock \
//!     1 hello --wait --wait-timeout 3s

use std::fs;
use std::sync::Arc;
use std::thread;

use cmdwire::protocol::{Command, ReceivedCommand, StreamFramer};
use cmdwire::session::{connect, Dispatcher, Outbound, SessionListener};
use cmdwire::transport::{Message, MessageSource};

const GREET: i32 = 1;
const GREETING: i32 = 2;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sock_dir = std::env::temp_dir().join(format!("cmdwire-uds-device-{}", std::process::id()));
    fs::create_dir_all(&sock_dir)?;
    let sock_path = sock_dir.join("device.sock");
    let _ = fs::remove_file(&sock_path);

    let mut dispatcher = Dispatcher::new();
    dispatcher.register(GREET, |out: &Outbound, cmd: &mut ReceivedCommand| {
        let name = cmd.read_string();
        out.send(&Command::new(GREETING).arg(format!("hello, {name}; welcome"))?)
    });
    let listener = SessionListener::bind(&sock_path, Arc::new(dispatcher))?;
    eprintln!("Listening on {}", listener.path().display());

    let device = thread::spawn(move || -> cmdwire::session::Result<()> {
        let conn = listener.accept()?;
        eprintln!("Session {} connected", conn.session.id());
        let stats = conn.run()?;
        eprintln!("Session closed after {} frames", stats.inbound.frames);
        Ok(())
    });

    let (client, mut source) = connect(&sock_path, Arc::new(Dispatcher::new()))?.into_parts();
    client
        .outbound()
        .send(&Command::new(GREET).arg("panel")?)?;

    let mut framer = StreamFramer::new();
    let mut reply = loop {
        if let Message::Text(text) = source.recv()? {
            if let Some(frame) = framer.feed(&text).into_iter().next() {
                break frame.parse(framer.config().empty_tokens)?;
            }
        }
    };
    println!("{} -> {}", reply.command_id(), reply.read_string());

    drop(client);
    drop(source);
    device.join().map_err(|_| "device thread panicked")??;
    let _ = fs::remove_dir_all(&sock_dir);
    Ok(())
}
