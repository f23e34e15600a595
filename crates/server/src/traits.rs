//! Server lifecycle traits

use async_trait::async_trait;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// A long-running network server
#[async_trait]
pub trait Server: Send + Sync + 'static {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Bound address while running
    fn address(&self) -> Option<SocketAddr>;

    fn is_running(&self) -> bool;

    /// Serve until `shutdown` is cancelled, then drain in-flight requests
    /// and return `Ok(())`.
    async fn run(&self, shutdown: CancellationToken) -> Result<()>;
}

/// Convenience methods for every [`Server`]
pub trait ServerExt: Server + Sized {
    /// Run on a background task. Cancel the returned token to stop it.
    fn spawn(self) -> (tokio::task::JoinHandle<Result<()>>, CancellationToken) {
        let token = CancellationToken::new();
        let child = token.clone();
        let handle = tokio::spawn(async move { self.run(child).await });
        (handle, token)
    }

    /// Run until the given controller shuts down
    fn run_until(
        self,
        controller: crate::shutdown::ShutdownController,
    ) -> impl std::future::Future<Output = Result<()>> + Send {
        let token = controller.child_token();
        async move { self.run(token).await }
    }
}

impl<T: Server + Sized> ServerExt for T {}

#[cfg(test)]
mod tests {
    use super::*;

    struct IdleServer;

    #[async_trait]
    impl Server for IdleServer {
        fn name(&self) -> &str {
            "idle"
        }

        fn address(&self) -> Option<SocketAddr> {
            None
        }

        fn is_running(&self) -> bool {
            false
        }

        async fn run(&self, shutdown: CancellationToken) -> Result<()> {
            shutdown.cancelled().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_spawned_server_stops_on_cancel() {
        let (handle, token) = IdleServer.spawn();
        token.cancel();

        let joined = tokio::time::timeout(std::time::Duration::from_secs(1), handle).await;
        assert!(matches!(joined, Ok(Ok(Ok(())))));
    }

    #[tokio::test]
    async fn test_run_until_controller_shutdown() {
        let controller = crate::shutdown::ShutdownController::new();
        let run = tokio::spawn(IdleServer.run_until(controller.clone()));
        controller.shutdown();

        let joined = tokio::time::timeout(std::time::Duration::from_secs(1), run).await;
        assert!(matches!(joined, Ok(Ok(Ok(())))));
    }
}
