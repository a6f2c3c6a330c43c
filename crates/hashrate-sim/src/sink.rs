//! Destinations for events produced by a [`Simulator`](crate::simulator::Simulator).

use std::io::{self, Write};

use crate::event::Event;

/// Receives events in emission order.
pub trait EventSink {
    fn emit(&mut self, event: Event) -> io::Result<()>;
}

/// Collects events in memory.
impl EventSink for Vec<Event> {
    fn emit(&mut self, event: Event) -> io::Result<()> {
        self.push(event);

        Ok(())
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: Event) -> io::Result<()> {
        (**self).emit(event)
    }
}

/// Writes each event as one line of JSON and flushes immediately, so a reader
/// on the other end of a pipe sees every event as soon as it happens.
#[derive(Debug)]
pub struct JsonLines<W> {
    writer: W,
}

impl<W: Write> JsonLines<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> EventSink for JsonLines<W> {
    fn emit(&mut self, event: Event) -> io::Result<()> {
        let line = event.encode()?;

        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}
