//! Receive loop over bounded blocking read slices.
//!
//! Each slice runs on a blocking thread and cannot be interrupted, so a
//! dropped `read` future leaves it running. Its handle is kept and the next
//! `read` collects its result first; bytes beyond `max_bytes` are held for
//! later calls. Nothing a finished slice delivered is lost.

use std::io;

use tokio::task::JoinHandle;

use crate::error::{Error, Result};

/// One slice: `Ok(None)` means nothing arrived before it gave up.
type Slice = io::Result<Option<Vec<u8>>>;

#[derive(Default)]
pub(crate) struct SlicedReader {
    pending: Option<JoinHandle<Slice>>,
    carry: Vec<u8>,
}

impl SlicedReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read up to `max_bytes`, issuing `slice` until one returns data.
    pub async fn read<F>(&mut self, max_bytes: usize, slice: F) -> Result<Vec<u8>>
    where
        F: Fn(usize) -> Slice + Clone + Send + 'static,
    {
        loop {
            if !self.carry.is_empty() {
                let rest = self.carry.split_off(max_bytes.min(self.carry.len()));
                return Ok(std::mem::replace(&mut self.carry, rest));
            }

            let handle = self.pending.get_or_insert_with(|| {
                let slice = slice.clone();
                tokio::task::spawn_blocking(move || slice(max_bytes))
            });
            let outcome = handle.await;
            self.pending = None;

            let data = outcome
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
                .map_err(Error::Transport)?;
            if let Some(data) = data {
                self.carry = data;
            }
        }
    }

    /// Forget any slice still running; used once the socket is gone.
    pub fn reset(&mut self) {
        self.pending = None;
        self.carry.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;

    /// Blocking source that waits `delay` per slice and hands out queued chunks.
    fn source(
        delay: Duration,
        chunks: &[&[u8]],
    ) -> impl Fn(usize) -> Slice + Clone + Send + 'static {
        let queue: Arc<Mutex<VecDeque<Vec<u8>>>> =
            Arc::new(Mutex::new(chunks.iter().map(|c| c.to_vec()).collect()));
        move |max_bytes| {
            std::thread::sleep(delay);
            Ok(queue.lock().unwrap().pop_front().map(|mut c| {
                c.truncate(max_bytes);
                c
            }))
        }
    }

    #[tokio::test]
    async fn test_abandoned_slice_is_collected_by_next_read() {
        let mut reader = SlicedReader::new();
        let slice = source(Duration::from_millis(200), &[&[0xEF, 0xA0, 0x14, 0x01, 0x4B]]);

        let first =
            tokio::time::timeout(Duration::from_millis(20), reader.read(7, slice.clone())).await;
        assert!(first.is_err());

        let data = reader.read(7, slice).await.unwrap();
        assert_eq!(data, vec![0xEF, 0xA0, 0x14, 0x01, 0x4B]);
    }

    #[tokio::test]
    async fn test_surplus_bytes_are_kept_for_the_next_read() {
        let mut reader = SlicedReader::new();
        let slice = source(Duration::ZERO, &[&[1, 2, 3, 4, 5, 6, 7, 8, 9]]);

        assert_eq!(reader.read(4, slice.clone()).await.unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(reader.read(4, slice.clone()).await.unwrap(), vec![5, 6, 7, 8]);
        assert_eq!(reader.read(4, slice).await.unwrap(), vec![9]);
    }

    #[tokio::test]
    async fn test_empty_slices_are_retried() {
        let mut reader = SlicedReader::new();
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        let slice = move |_: usize| -> Slice {
            let mut n = counter.lock().unwrap();
            *n += 1;
            Ok(if *n < 3 { None } else { Some(vec![0xFE]) })
        };

        assert_eq!(reader.read(7, slice).await.unwrap(), vec![0xFE]);
        assert_eq!(*calls.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_slice_error_is_a_transport_error() {
        let mut reader = SlicedReader::new();
        let slice = |_: usize| -> Slice {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
        };
        match reader.read(7, slice).await {
            Err(Error::Transport(e)) => assert_eq!(e.kind(), io::ErrorKind::ConnectionReset),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
