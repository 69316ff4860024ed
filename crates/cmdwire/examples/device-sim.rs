//! Host and simulated device talking over an in-memory pair.
//!
//! Run with:
//!   cargo run --example device-sim

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use cmdwire::protocol::{Command, ReceivedCommand};
use cmdwire::session::{Dispatcher, Outbound, Session};
use cmdwire::transport::memory;

const SET_LED: i32 = 1;
const LED_SET: i32 = 2;
const READ_TEMP: i32 = 3;
const TEMP: i32 = 4;
const ERROR: i32 = 99;

fn device_dispatcher() -> Dispatcher<Outbound> {
    let mut dispatcher = Dispatcher::new();

    dispatcher.register(SET_LED, |out: &Outbound, cmd: &mut ReceivedCommand| {
        let image = cmd.read_string();
        let on = cmd.read_bool();
        eprintln!("device: LED {image} -> {}", if on { "on" } else { "off" });
        out.send(&Command::new(LED_SET).arg(image)?.arg(on)?)
    });

    dispatcher.register(READ_TEMP, |out: &Outbound, cmd: &mut ReceivedCommand| {
        let sensor = cmd.read_i16();
        let reading = 21.5_f32 + f32::from(sensor);
        out.send(&Command::new(TEMP).arg(sensor)?.arg(reading)?)
    });

    dispatcher.set_fallback(|out: &Outbound, cmd: &mut ReceivedCommand| {
        out.send(&Command::new(ERROR).arg(cmd.command_id())?)
    });

    dispatcher
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (host_end, device_end) = memory::pair();

    let device = thread::spawn(move || {
        let (sink, mut source) = device_end.into_parts();
        let mut session = Session::new("device", Arc::new(device_dispatcher()), sink);
        session.run(&mut source).map(|_| session.stats())
    });

    let replies = Arc::new(Mutex::new(Vec::new()));
    let mut host_dispatcher = Dispatcher::new();
    let log = Arc::clone(&replies);
    host_dispatcher.set_fallback(move |_: &Outbound, cmd: &mut ReceivedCommand| {
        let line = format!("{} {:?}", cmd.command_id(), cmd.tokens());
        log.lock().map_err(cmdwire::session::SessionError::handler)?.push(line);
        Ok(())
    });

    let (sink, mut source) = host_end.into_parts();
    let mut host = Session::new("host", Arc::new(host_dispatcher), sink);

    host.outbound().send(
        &Command::new(SET_LED)
            .arg("LED_green.png")?
            .arg(true)?
            .request_ack(LED_SET, Duration::from_secs(1)),
    )?;
    host.outbound().send(&Command::new(READ_TEMP).arg(2_i16)?)?;
    host.outbound().send(&Command::new(42))?;

    for _ in 0..3 {
        let message = source.recv_timeout(Duration::from_secs(1))?;
        host.on_message(message);
    }

    println!("pending acks: {}", host.outbound().acks().len());
    for line in replies.lock().map_err(|err| err.to_string())?.iter() {
        println!("reply {line}");
    }

    drop(host);
    let stats = device.join().map_err(|_| "device thread panicked")??;
    println!("device stats: {}", serde_json::to_string(&stats)?);
    Ok(())
}
