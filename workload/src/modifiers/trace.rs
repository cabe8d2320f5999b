// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! `Trace`: pass-through that logs selected lifecycle events to stdout or a
//! per-instance file.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Write};
use std::rc::Rc;

use config::ConfigError;
use pipeline::{Message, Pe, WorkloadComponent};

const KNOWN_EVENTS: [&str; 4] = ["test", "get", "next", "eject"];

pub struct Trace {
    inner: Box<dyn WorkloadComponent>,
    events: HashSet<String>,
    show_time: bool,
    writer: RefCell<Box<dyn Write>>,
}

impl std::fmt::Debug for Trace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trace")
            .field("events", &self.events)
            .field("show_time", &self.show_time)
            .finish_non_exhaustive()
    }
}

impl Trace {
    pub fn new(inner: Box<dyn WorkloadComponent>, options: &[String]) -> Result<Self, ConfigError> {
        let mut events = HashSet::new();
        let mut show_time = false;
        let mut file_path = None;
        for opt in options {
            if opt == "time" {
                show_time = true;
            } else if let Some(path) = opt.strip_prefix("file=") {
                file_path = Some(path.to_owned());
            } else if KNOWN_EVENTS.contains(&opt.as_str()) {
                events.insert(opt.clone());
            } else {
                return Err(ConfigError::MalformedSpecifier { spec: opt.clone() });
            }
        }
        let writer: Box<dyn Write> = match file_path {
            Some(path) => Box::new(File::create(path).map_err(|e| ConfigError::MalformedSpecifier { spec: e.to_string() })?),
            None => Box::new(io::stdout()),
        };
        Ok(Self {
            inner,
            events,
            show_time,
            writer: RefCell::new(writer),
        })
    }

    fn emit(&self, event: &str, pe: Pe, now: u64) {
        if !self.events.contains(event) {
            return;
        }
        let mut w = self.writer.borrow_mut();
        let _ = if self.show_time {
            writeln!(w, "time={now} {event} pe={pe}")
        } else {
            writeln!(w, "{event} pe={pe}")
        };
    }
}

impl WorkloadComponent for Trace {
    fn init(&mut self, pes: u32) {
        self.inner.init(pes);
    }

    fn test(&mut self, src: Pe, now: u64) -> bool {
        let result = self.inner.test(src, now);
        self.emit("test", src, now);
        result
    }

    fn get(&mut self, src: Pe, now: u64) -> Option<Rc<Message>> {
        let result = self.inner.get(src, now);
        self.emit("get", src, now);
        result
    }

    fn next(&mut self, src: Pe, now: u64) {
        self.inner.next(src, now);
        self.emit("next", src, now);
    }

    fn eject(&mut self, dest: Pe, msg: Rc<Message>, now: u64) {
        self.inner.eject(dest, msg, now);
        self.emit("eject", dest, now);
    }
}
