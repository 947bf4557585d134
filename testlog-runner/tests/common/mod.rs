// Copyright (c) The testlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{
    io::{self, Write},
    sync::{Arc, Mutex},
    thread,
};
use testlog_runner::test_model::{LeafResult, SourceLocation, TestGroup, TestItem, TestItemId};

/// A writer whose contents can be inspected after it has been handed off.
///
/// If `chunk_size` is set, each call to `write` accepts at most that many bytes and yields to
/// other threads, so that unsynchronized writers would interleave.
#[derive(Clone, Default)]
pub struct SharedBuffer {
    buf: Arc<Mutex<Vec<u8>>>,
    chunk_size: Option<usize>,
}

impl SharedBuffer {
    #[allow(dead_code)]
    pub fn chunked(chunk_size: usize) -> Self {
        Self {
            buf: Arc::default(),
            chunk_size: Some(chunk_size),
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        self.buf.lock().unwrap().clone()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let len = self.chunk_size.map_or(buf.len(), |size| size.min(buf.len()));
        self.buf.lock().unwrap().extend_from_slice(&buf[..len]);
        if self.chunk_size.is_some() {
            thread::yield_now();
        }
        Ok(len)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn make_item(id: usize, name: &str) -> TestItem {
    TestItem::new(
        TestItemId::new(id.to_string()),
        name,
        SourceLocation::new(format!("/proj/test/item_{id}_tests.rs"), 10, "/proj"),
    )
}

pub fn failing_results(description: &str, message: &str) -> TestGroup {
    TestGroup::new(description)
        .with_passed(1)
        .with_child(LeafResult::fail(message))
}
