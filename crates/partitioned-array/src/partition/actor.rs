//! The task owning a partition's buffer.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, trace};

use super::{Buffer, CopyMode, Request};
use crate::element::Element;
use crate::error::{ArrayError, Result};
use crate::locality::Locality;
use crate::pool::BufferPool;
use crate::shape::{copy_region, Region};

struct PartitionState<T, const R: usize> {
    region: Region<R>,
    data: Result<Arc<Vec<T>>>,
    pool: BufferPool,
}

pub(super) async fn run<T, F, const R: usize>(
    region: Region<R>,
    init: F,
    mut requests: mpsc::UnboundedReceiver<Request<T, R>>,
    locality: Locality,
    pool: BufferPool,
) where
    T: Element,
    F: Future<Output = Result<Vec<T>>> + Send + 'static,
{
    let mut shutdown = locality.subscribe();

    let data = tokio::select! {
        biased;
        _ = shutdown_signalled(&mut shutdown) => {
            locality.partition_stopped();
            return;
        }
        data = init => data,
    };

    let data = data.and_then(|data| {
        if data.len() == region.nr_elements() {
            Ok(Arc::new(data))
        } else {
            Err(ArrayError::configuration(format!(
                "partition {} was produced with {} elements, expected {}",
                region,
                data.len(),
                region.nr_elements()
            )))
        }
    });

    if let Err(err) = &data {
        debug!(partition = %region, error = %err, "Partition data unavailable");
    }

    let mut state = PartitionState { region, data, pool };

    loop {
        tokio::select! {
            biased;
            _ = shutdown_signalled(&mut shutdown) => break,
            request = requests.recv() => match request {
                Some(request) => state.handle(request),
                None => break,
            },
        }
    }

    trace!(partition = %region, locality = %locality.id(), "Partition actor stopped");
    state.release();
    locality.partition_stopped();
}

async fn shutdown_signalled(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl<T: Element, const R: usize> PartitionState<T, R> {
    fn handle(&mut self, request: Request<T, R>) {
        // A dropped reply channel means the caller lost interest
        match request {
            Request::Offset(reply) => {
                let _ = reply.send(Ok(self.region.offset));
            }
            Request::Shape(reply) => {
                let _ = reply.send(Ok(self.region.shape));
            }
            Request::NrElements(reply) => {
                let _ = reply.send(Ok(self.region.nr_elements()));
            }
            Request::Ready(reply) => {
                let _ = reply.send(self.data.as_ref().map(|_| ()).map_err(Clone::clone));
            }
            Request::Data { mode, reply } => {
                let _ = reply.send(self.data(mode));
            }
            Request::Slice { region, reply } => {
                let _ = reply.send(self.slice(&region));
            }
            Request::Fill { value, reply } => {
                self.fill(value);
                let _ = reply.send(Ok(()));
            }
            Request::SetData { data, reply } => {
                let _ = reply.send(self.set_data(data));
            }
        }
    }

    fn data(&self, mode: CopyMode) -> Result<Buffer<T>> {
        let data = self.data.as_ref().map_err(Clone::clone)?;
        Ok(match mode {
            CopyMode::Copy => Buffer::Owned(self.pool.acquire_copy(data)),
            CopyMode::Share => Buffer::Shared(Arc::clone(data)),
        })
    }

    fn slice(&self, region: &Region<R>) -> Result<Vec<T>> {
        let data = self.data.as_ref().map_err(Clone::clone)?;

        if !self.region.contains_region(region) {
            return Err(ArrayError::configuration(format!(
                "slice {} lies outside partition {}",
                region, self.region
            )));
        }

        let mut slice = self.pool.acquire_filled(region.nr_elements(), T::default());
        copy_region(data, &self.region, &mut slice, region, region);
        Ok(slice)
    }

    fn fill(&mut self, value: T) {
        // Copy-on-write: a buffer still shared with readers is replaced
        if let Ok(data) = &mut self.data {
            if let Some(data) = Arc::get_mut(data) {
                data.fill(value);
                return;
            }
        }

        let data = self.pool.acquire_filled(self.region.nr_elements(), value);
        self.replace(data);
    }

    fn set_data(&mut self, data: Vec<T>) -> Result<()> {
        if data.len() != self.region.nr_elements() {
            return Err(ArrayError::configuration(format!(
                "buffer of {} elements does not fit partition {} of {} elements",
                data.len(),
                self.region,
                self.region.nr_elements()
            )));
        }

        self.replace(data);
        Ok(())
    }

    fn replace(&mut self, data: Vec<T>) {
        let previous = std::mem::replace(&mut self.data, Ok(Arc::new(data)));
        if let Ok(previous) = previous {
            if let Ok(buffer) = Arc::try_unwrap(previous) {
                self.pool.release(buffer);
            }
        }
    }

    fn release(self) {
        if let Ok(data) = self.data {
            if let Ok(buffer) = Arc::try_unwrap(data) {
                self.pool.release(buffer);
            }
        }
    }
}
