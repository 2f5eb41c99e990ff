mod checkpoint_client;
mod codec;
mod coordinator;
mod ctx;
mod error;
mod executor;
mod id_allocator;
mod log;
pub mod operations;
mod scheduler;
mod worker_pool;

pub use checkpoint_client::{CheckpointClient, CheckpointToken, estimate_batch_size, LIMIT};
pub use codec::{JsonCodec, ValueCodec};
pub use coordinator::CheckpointCoordinator;
pub use ctx::{Ctx, ExecutionHandle};
pub use error::{CheckpointError, CodecError, RuntimeError};
pub use executor::{ExecutionOutcome, ExecutionOutput, Executor, ExecutorConfig};
pub use id_allocator::{IdAllocator, ReplayCursor};
pub use log::ExecutionLog;
pub use operations::callback::Callback;
pub use scheduler::{Scheduler, ThreadRole, current_role, with_role};
pub use worker_pool::WorkerPool;
