use {
    crate::{store::StoreResult, Error, Operation, Result},
    std::{future::Future, time::Duration},
    tokio::time::Instant,
    tokio_util::sync::CancellationToken,
    tracing::Instrument as _,
};

/// Per-call execution context.
///
/// Carries the deadline and the cancellation token every remote call of an
/// operation is bound to, the name of the operation being executed and the
/// [`tracing::Span`] remote calls are instrumented with.
#[derive(Clone, Debug)]
pub struct Context {
    operation: Option<Operation>,
    deadline: Option<Instant>,
    cancellation: Option<CancellationToken>,
    span: tracing::Span,
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl Context {
    /// Creates a [`Context`] without a deadline or cancellation.
    pub fn background() -> Self {
        Self {
            operation: None,
            deadline: None,
            cancellation: None,
            span: tracing::Span::none(),
        }
    }

    /// Bounds the context by a timeout counted from now. An earlier existing
    /// deadline is kept.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Bounds the context by a deadline. An earlier existing deadline is
    /// kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// Cancels the remote calls of this context once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Instruments the remote calls of this context with `span`.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub(crate) fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Returns the [`Operation`] being executed, set by the
    /// [`Table`](crate::Table) before any remote call.
    pub fn operation(&self) -> Option<Operation> {
        self.operation
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// Fails if the context is already cancelled or past its deadline.
    pub(crate) fn check(&self, op: Operation) -> Result<()> {
        if self.cancellation.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Err(Error::Cancelled(op));
        }

        if self.deadline.is_some_and(|d| d <= Instant::now()) {
            return Err(Error::DeadlineExceeded(op));
        }

        Ok(())
    }

    /// Drives a remote call until it completes, the deadline elapses or the
    /// context gets cancelled.
    pub(crate) async fn run<T, F>(&self, op: Operation, call: F) -> Result<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        self.check(op)?;

        let cancelled = async {
            match &self.cancellation {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;

            _ = cancelled => Err(Error::Cancelled(op)),
            _ = deadline => Err(Error::DeadlineExceeded(op)),
            res = call.instrument(self.span.clone()) => {
                res.map_err(|source| Error::Store { operation: op, source })
            }
        }
    }
}
