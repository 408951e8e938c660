// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Scheduler plumbing.
//!
//! The broker needs two capabilities from its host: spawning a task onto a
//! single-threaded executor, and deferring a thunk to a later turn with FIFO
//! ordering between deferrals. The first comes straight from
//! [`futures::task::LocalSpawn`]; the second is layered on top with a drain
//! queue so that two deferred publishes issued in the same turn dispatch in
//! issue order regardless of the executor's internal polling order.

use std::{cell::RefCell, collections::VecDeque, future::Future, rc::Rc};

use futures::task::{LocalSpawn, LocalSpawnExt};

type Thunk = Box<dyn FnOnce()>;

#[derive(Default)]
struct DeferQueue {
    thunks: VecDeque<Thunk>,
    draining: bool,
}

/// The broker's handle to the host executor.
///
/// Cheap to clone; clones share the spawner and the deferral queue.
#[derive(Clone)]
pub struct Scheduler {
    spawner: Rc<dyn LocalSpawn>,
    deferred: Rc<RefCell<DeferQueue>>,
}

impl Scheduler {
    /// Wraps a local spawner, e.g. `futures::executor::LocalPool::spawner()`.
    pub fn new(spawner: impl LocalSpawn + 'static) -> Self {
        Self {
            spawner: Rc::new(spawner),
            deferred: Rc::new(RefCell::new(DeferQueue::default())),
        }
    }

    /// Spawns `future` as a task on the host executor.
    pub(crate) fn spawn(&self, future: impl Future<Output = ()> + 'static) {
        if let Err(e) = self.spawner.spawn_local(future) {
            log::error!("Failed to spawn broker task: {e}");
        }
    }

    /// Defers `thunk` to a later turn. Deferred thunks run in FIFO order;
    /// thunks deferred while draining run in the same drain cycle.
    pub(crate) fn defer(&self, thunk: impl FnOnce() + 'static) {
        let start_drain = {
            let mut queue = self.deferred.borrow_mut();
            queue.thunks.push_back(Box::new(thunk));
            !queue.draining && {
                queue.draining = true;
                true
            }
        };
        if start_drain {
            let deferred = self.deferred.clone();
            self.spawn(async move {
                loop {
                    let thunk = {
                        let mut queue = deferred.borrow_mut();
                        match queue.thunks.pop_front() {
                            Some(thunk) => thunk,
                            None => {
                                queue.draining = false;
                                break;
                            }
                        }
                    };
                    thunk();
                }
            });
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(Scheduler))
            .field("deferred", &self.deferred.borrow().thunks.len())
            .finish()
    }
}

#[cfg(feature = "live")]
mod live {
    use futures::task::{LocalFutureObj, LocalSpawn, SpawnError};

    /// A spawner backed by `tokio::task::spawn_local`.
    ///
    /// Must be used from within a `tokio::task::LocalSet` context.
    #[derive(Copy, Clone, Debug, Default)]
    pub struct TokioSpawner;

    impl LocalSpawn for TokioSpawner {
        fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
            tokio::task::spawn_local(future);
            Ok(())
        }
    }
}

#[cfg(feature = "live")]
pub use live::TokioSpawner;
