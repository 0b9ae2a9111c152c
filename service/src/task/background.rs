//! Background environment for running [`Task`]s.

use std::{
    error::Error,
    future::{Future, IntoFuture},
    iter,
};

use futures::{
    future::{self, LocalBoxFuture},
    FutureExt as _, TryFutureExt as _,
};
use tokio::task;
use tracing as log;

#[cfg(doc)]
use crate::Task;

/// Handle of a spawned [`Task`].
type Handle = task::JoinHandle<Result<(), Box<dyn Error>>>;

/// Background environment running the periodic [`Task`]s on the current
/// thread.
///
/// Resolves with the first failure of any of its [`Task`]s.
#[derive(Debug, Default)]
pub struct Background {
    /// Local set the [`Task`]s are spawned on.
    set: task::LocalSet,

    /// [`Handle`]s of the spawned [`Task`]s.
    handles: Vec<Handle>,
}

impl Background {
    /// Spawns the provided [`Task`] loop, naming it in its failure.
    pub fn spawn<F, E>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = Result<(), E>> + 'static,
        E: Error + 'static,
    {
        log::debug!(task = name, "spawning background task");
        self.handles.push(self.set.spawn_local(task.map_err(move |e| {
            Box::<dyn Error>::from(format!("`{name}` task failed: {e}"))
        })));
    }
}

impl IntoFuture for Background {
    type Output = Result<(), Box<dyn Error>>;
    type IntoFuture = LocalBoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        let Self { set, handles } = self;
        let tasks = handles.into_iter().map(|h| {
            h.map(|joined| joined.unwrap_or_else(|e| Err(e.into())))
                .boxed_local()
        });
        future::try_join_all(iter::once(set.map(Ok).boxed_local()).chain(tasks))
            .map_ok(drop)
            .boxed_local()
    }
}

#[cfg(test)]
mod spec {
    use std::{convert::Infallible, fmt};

    use super::Background;

    #[tokio::test]
    async fn completes_with_all_tasks() {
        let mut bg = Background::default();
        bg.spawn("first", async { Ok::<_, Infallible>(()) });
        bg.spawn("second", async { Ok::<_, Infallible>(()) });

        assert!(bg.await.is_ok());
    }

    #[tokio::test]
    async fn names_failed_task() {
        let mut bg = Background::default();
        bg.spawn("healthy", async { Ok::<_, Infallible>(()) });
        bg.spawn("broken", async { Err(fmt::Error) });

        let err = bg.await.unwrap_err();

        assert!(err.to_string().contains("`broken` task failed"));
    }
}
