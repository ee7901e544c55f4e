//! Array partitions and their client handles.
//!
//! Every partition is owned by an actor task pinned to one locality. The
//! actor holds the element buffer; clients talk to it exclusively through
//! messages, each carrying a oneshot channel for the reply. Any number of
//! [`ArrayPartition`] handles may refer to the same actor. The actor stops
//! when the last handle is dropped or when its locality shuts down.

mod actor;

use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::element::Element;
use crate::error::{ArrayError, Result};
use crate::locality::Locality;
use crate::pool::BufferPool;
use crate::shape::{Offset, Region, Shape};

/// How partition data is handed to a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMode {
    /// An independent copy the caller may mutate.
    Copy,
    /// A reference counted read-only view of the partition's buffer.
    Share,
}

/// Partition data returned by [`ArrayPartition::data`].
#[derive(Debug, Clone)]
pub enum Buffer<T> {
    Owned(Vec<T>),
    Shared(Arc<Vec<T>>),
}

impl<T: Clone> Buffer<T> {
    /// Convert into an owned vector, copying only if the view is still shared.
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Buffer::Owned(data) => data,
            Buffer::Shared(data) => Arc::try_unwrap(data).unwrap_or_else(|data| (*data).clone()),
        }
    }
}

impl<T> Buffer<T> {
    pub fn is_shared(&self) -> bool {
        matches!(self, Buffer::Shared(_))
    }
}

impl<T> Deref for Buffer<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        match self {
            Buffer::Owned(data) => data,
            Buffer::Shared(data) => data,
        }
    }
}

pub(crate) type Reply<V> = oneshot::Sender<Result<V>>;

pub(crate) enum Request<T, const R: usize> {
    Offset(Reply<Offset<R>>),
    Shape(Reply<Shape<R>>),
    NrElements(Reply<usize>),
    Ready(Reply<()>),
    Data { mode: CopyMode, reply: Reply<Buffer<T>> },
    Slice { region: Region<R>, reply: Reply<Vec<T>> },
    Fill { value: T, reply: Reply<()> },
    SetData { data: Vec<T>, reply: Reply<()> },
}

/// Client handle to a partition actor.
pub struct ArrayPartition<T, const R: usize> {
    region: Region<R>,
    locality: Locality,
    sender: mpsc::UnboundedSender<Request<T, R>>,
}

impl<T, const R: usize> Clone for ArrayPartition<T, R> {
    fn clone(&self) -> Self {
        Self {
            region: self.region,
            locality: self.locality.clone(),
            sender: self.sender.clone(),
        }
    }
}

impl<T: Element, const R: usize> ArrayPartition<T, R> {
    /// Start a partition actor whose data is produced by `init`.
    ///
    /// Requests sent before `init` resolves are queued and answered once
    /// the data is ready. If `init` fails, every data request receives
    /// that error. Must be called from within a Tokio runtime.
    pub fn spawn<F>(region: Region<R>, locality: &Locality, pool: BufferPool, init: F) -> Self
    where
        F: Future<Output = Result<Vec<T>>> + Send + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        locality.partition_started();

        tokio::spawn(actor::run(
            region,
            init,
            receiver,
            locality.clone(),
            pool,
        ));

        Self {
            region,
            locality: locality.clone(),
            sender,
        }
    }

    /// Start a partition actor holding `data`.
    pub fn from_vec(
        region: Region<R>,
        locality: &Locality,
        pool: BufferPool,
        data: Vec<T>,
    ) -> Self {
        Self::spawn(region, locality, pool, async move { Ok(data) })
    }

    /// Region of the partition in global index space, known without a
    /// round trip to the actor.
    pub fn region(&self) -> &Region<R> {
        &self.region
    }

    pub fn locality(&self) -> &Locality {
        &self.locality
    }

    /// Whether the owning actor still accepts requests.
    pub fn is_alive(&self) -> bool {
        !self.sender.is_closed() && !self.locality.is_shut_down()
    }

    pub async fn offset(&self) -> Result<Offset<R>> {
        self.call(Request::Offset).await
    }

    pub async fn shape(&self) -> Result<Shape<R>> {
        self.call(Request::Shape).await
    }

    pub async fn nr_elements(&self) -> Result<usize> {
        self.call(Request::NrElements).await
    }

    /// Resolves once the partition's data has been produced.
    pub async fn ready(&self) -> Result<()> {
        self.call(Request::Ready).await
    }

    /// The partition's elements, copied or shared depending on `mode`.
    pub async fn data(&self, mode: CopyMode) -> Result<Buffer<T>> {
        self.call(|reply| Request::Data { mode, reply }).await
    }

    /// Copy of the cells in `region`, which must lie within the partition.
    pub async fn slice(&self, region: Region<R>) -> Result<Vec<T>> {
        self.call(|reply| Request::Slice { region, reply }).await
    }

    /// Set every element to `value`.
    pub async fn fill(&self, value: T) -> Result<()> {
        self.call(|reply| Request::Fill { value, reply }).await
    }

    /// Replace the partition's elements. `data` must hold exactly
    /// `nr_elements` values.
    pub async fn set_data(&self, data: Vec<T>) -> Result<()> {
        self.call(|reply| Request::SetData { data, reply }).await
    }

    async fn call<V>(&self, make: impl FnOnce(Reply<V>) -> Request<T, R>) -> Result<V> {
        if self.locality.is_shut_down() {
            return Err(self.gone());
        }

        let (reply, response) = oneshot::channel();
        self.sender.send(make(reply)).map_err(|_| self.gone())?;
        response.await.map_err(|_| self.gone())?
    }

    fn gone(&self) -> ArrayError {
        ArrayError::remote_access(format!(
            "partition {} on {} no longer exists",
            self.region,
            self.locality.id()
        ))
    }
}

impl<T, const R: usize> std::fmt::Debug for ArrayPartition<T, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrayPartition")
            .field("region", &self.region)
            .field("locality", &self.locality.id())
            .finish()
    }
}
