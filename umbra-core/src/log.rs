// Copyright (c) 2019-present Dmitry Stepanov and Fyrox Engine contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Simple logger. By default, it writes in the console only. To mirror the log into a file, call
//! [`Log::set_file_name`] somewhere at startup.
//!
//! The logger is process wide: passes running on the render thread and actions scheduled by
//! other threads write into the same sink.

use crate::parking_lot::Mutex;
use fxhash::FxHashMap;
use std::{
    collections::hash_map::Entry,
    fmt::{Debug, Display},
    io::{self, Write},
    path::Path,
    sync::{mpsc::Sender, LazyLock},
    time::{Duration, Instant},
};

/// A message that could be sent by the logger to all listeners.
#[derive(Clone, Debug)]
pub struct LogMessage {
    /// Kind of the message: information, warning or error.
    pub kind: MessageKind,
    /// The source message without logger prefixes.
    pub content: String,
    /// Time point at which the message was recorded. It is relative to the moment when the
    /// logger was initialized.
    pub time: Duration,
}

static LOG: LazyLock<Mutex<Log>> = LazyLock::new(|| {
    Mutex::new(Log {
        file: None,
        verbosity: MessageKind::Information,
        listeners: Default::default(),
        time_origin: Instant::now(),
        one_shot_sources: Default::default(),
    })
});

/// A kind of message.
#[derive(Debug, Default, Copy, Clone, PartialOrd, PartialEq, Eq, Ord, Hash)]
#[repr(u32)]
pub enum MessageKind {
    /// Some useful information.
    #[default]
    Information = 0,
    /// A warning.
    Warning = 1,
    /// An error of some kind.
    Error = 2,
}

impl MessageKind {
    fn as_str(self) -> &'static str {
        match self {
            MessageKind::Information => "[INFO]: ",
            MessageKind::Warning => "[WARNING]: ",
            MessageKind::Error => "[ERROR]: ",
        }
    }
}

/// See module docs.
pub struct Log {
    file: Option<std::fs::File>,
    verbosity: MessageKind,
    listeners: Vec<Sender<LogMessage>>,
    time_origin: Instant,
    one_shot_sources: FxHashMap<usize, String>,
}

impl Log {
    /// Creates a new log file at the specified path.
    pub fn set_file_name<P: AsRef<Path>>(path: P) {
        LOG.lock().file = std::fs::File::create(path).ok();
    }

    /// Sets new file to write the log to.
    pub fn set_file(file: Option<std::fs::File>) {
        LOG.lock().file = file;
    }

    fn write_internal<S>(&mut self, id: Option<usize>, kind: MessageKind, message: S) -> bool
    where
        S: AsRef<str>,
    {
        let mut msg = message.as_ref().to_owned();
        if kind as u32 >= self.verbosity as u32 {
            if let Some(id) = id {
                match self.one_shot_sources.entry(id) {
                    Entry::Occupied(mut previous) => {
                        if previous.get() == &msg {
                            return false;
                        }
                        previous.insert(msg.clone());
                    }
                    Entry::Vacant(entry) => {
                        entry.insert(msg.clone());
                    }
                }
            }

            // Notify listeners about the message and remove all disconnected listeners.
            let time = self.time_origin.elapsed();
            self.listeners.retain(|listener| {
                listener
                    .send(LogMessage {
                        kind,
                        content: msg.clone(),
                        time,
                    })
                    .is_ok()
            });

            msg.insert_str(0, kind.as_str());

            let _ = io::stdout().write_all(msg.as_bytes());

            if let Some(log_file) = self.file.as_mut() {
                let _ = log_file.write_all(msg.as_bytes());
                let _ = log_file.flush();
            }
        }

        true
    }

    fn writeln_internal<S>(&mut self, id: Option<usize>, kind: MessageKind, message: S) -> bool
    where
        S: AsRef<str>,
    {
        let mut msg = message.as_ref().to_owned();
        msg.push('\n');
        self.write_internal(id, kind, msg)
    }

    /// Writes a string to the console and optionally into the file (if set).
    pub fn write<S>(kind: MessageKind, msg: S)
    where
        S: AsRef<str>,
    {
        LOG.lock().write_internal(None, kind, msg);
    }

    /// Writes a string to the console and optionally into the file (if set). Unlike [`Self::write`]
    /// this method writes the message only once per given id if the message remains the same. If
    /// the message changes, then the new version will be printed to the log. Useful for errors
    /// that would otherwise repeat every frame.
    pub fn write_once<S>(id: usize, kind: MessageKind, msg: S) -> bool
    where
        S: AsRef<str>,
    {
        LOG.lock().write_internal(Some(id), kind, msg)
    }

    /// Writes a string to the console and optionally into the file (if set), adds a new line to the
    /// end of the message.
    pub fn writeln<S>(kind: MessageKind, msg: S)
    where
        S: AsRef<str>,
    {
        LOG.lock().writeln_internal(None, kind, msg);
    }

    /// Same as [`Self::writeln`], but prints the message only once. See [`Self::write_once`].
    pub fn writeln_once<S>(id: usize, kind: MessageKind, msg: S) -> bool
    where
        S: AsRef<str>,
    {
        LOG.lock().writeln_internal(Some(id), kind, msg)
    }

    /// Writes an information message.
    pub fn info<S>(msg: S)
    where
        S: AsRef<str>,
    {
        Self::writeln(MessageKind::Information, msg)
    }

    /// Writes a warning message.
    pub fn warn<S>(msg: S)
    where
        S: AsRef<str>,
    {
        Self::writeln(MessageKind::Warning, msg)
    }

    /// Writes error message.
    pub fn err<S>(msg: S)
    where
        S: AsRef<str>,
    {
        Self::writeln(MessageKind::Error, msg)
    }

    /// Writes an information message once. See [`Self::write_once`] for more info.
    pub fn info_once<S>(id: usize, msg: S) -> bool
    where
        S: AsRef<str>,
    {
        Self::writeln_once(id, MessageKind::Information, msg)
    }

    /// Writes a warning message once. See [`Self::write_once`] for more info.
    pub fn warn_once<S>(id: usize, msg: S) -> bool
    where
        S: AsRef<str>,
    {
        Self::writeln_once(id, MessageKind::Warning, msg)
    }

    /// Writes an error message once. See [`Self::write_once`] for more info.
    pub fn err_once<S>(id: usize, msg: S) -> bool
    where
        S: AsRef<str>,
    {
        Self::writeln_once(id, MessageKind::Error, msg)
    }

    /// Sets verbosity level.
    pub fn set_verbosity(kind: MessageKind) {
        LOG.lock().verbosity = kind;
    }

    /// Adds a listener that will receive a copy of every message passed into the log.
    pub fn add_listener(listener: Sender<LogMessage>) {
        LOG.lock().listeners.push(listener)
    }

    /// Logs the error (if any) and lets the caller continue. Used where a failure must not abort
    /// the frame.
    pub fn verify<T, E>(result: Result<T, E>)
    where
        E: Debug,
    {
        if let Err(e) = result {
            Self::writeln(
                MessageKind::Error,
                format!("Operation failed! Reason: {e:?}"),
            );
        }
    }

    /// Same as [`Self::verify`], but prefixes the error with a custom message.
    pub fn verify_message<S, T, E>(result: Result<T, E>, msg: S)
    where
        E: Debug,
        S: Display,
    {
        if let Err(e) = result {
            Self::writeln(MessageKind::Error, format!("{msg}. Reason: {e:?}"));
        }
    }
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::log::Log::info(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::log::Log::warn(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! err {
    ($($arg:tt)*) => {
        $crate::log::Log::err(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! info_once {
    ($id:expr, $($arg:tt)*) => {
        $crate::log::Log::info_once($id, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! warn_once {
    ($id:expr, $($arg:tt)*) => {
        $crate::log::Log::warn_once($id, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! err_once {
    ($id:expr, $($arg:tt)*) => {
        $crate::log::Log::err_once($id, format!($($arg)*))
    };
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn test_listener_receives_messages_and_once_suppresses_repeats() {
        let (sender, receiver) = channel();
        Log::add_listener(sender);

        // Unique id, other tests may log concurrently.
        let id = 0xDEAD_BEEF;
        assert!(Log::err_once(id, "log test: first"));
        assert!(!Log::err_once(id, "log test: first"));
        assert!(Log::err_once(id, "log test: second"));
        Log::verify::<(), _>(Err("log test: failure"));

        let messages = receiver
            .try_iter()
            .filter(|m| m.content.contains("log test"))
            .collect::<Vec<_>>();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].kind, MessageKind::Error);
        assert_eq!(messages[0].content, "log test: first\n");
        assert_eq!(messages[1].content, "log test: second\n");
        assert!(messages[2].content.contains("Operation failed!"));
    }

    #[test]
    fn test_messages_below_verbosity_are_dropped() {
        let (sender, receiver) = channel();
        Log::add_listener(sender);

        Log::set_verbosity(MessageKind::Warning);
        Log::info("verbosity test: hidden");
        Log::warn("verbosity test: shown");
        Log::set_verbosity(MessageKind::Information);

        let messages = receiver
            .try_iter()
            .filter(|m| m.content.contains("verbosity test"))
            .collect::<Vec<_>>();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].kind, MessageKind::Warning);
    }
}
