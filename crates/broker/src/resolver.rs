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

//! Promissory aggregation of subscriber outcomes.
//!
//! Every publish yields a [`Publication`] whose resolution is decided by a
//! *latch* over the outcomes of the notified subscribers. With `latch >= 1`
//! the value is a count, otherwise a fraction of the dispatch list; with
//! `settlement_latch` settled outcomes count, otherwise only fulfillments.
//! The publication settles as soon as the latch is met, or rejects as soon
//! as it becomes impossible to meet.

use std::{
    cell::RefCell,
    fmt::{self, Debug},
    future::Future,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll},
};

use futures::channel::oneshot;

use crate::{
    message::{Outcome, Payload},
    subscription::Token,
};

/// A settled publication result: fulfillment values or rejection values, in
/// completion order.
pub type Verdict = Result<Vec<Payload>, Vec<Payload>>;

#[derive(Debug, Default)]
pub(crate) struct PublicationState {
    pub(crate) fulfilled: Vec<Payload>,
    pub(crate) rejected: Vec<Payload>,
    pub(crate) pending: usize,
    pub(crate) total: usize,
    pub(crate) settled: bool,
    pub(crate) token: Option<Token>,
    pub(crate) sender: Option<oneshot::Sender<Verdict>>,
}

/// Collapses subscriber outcomes into the publication verdict under the
/// latch policy.
#[derive(Debug)]
pub(crate) struct Resolver {
    state: Rc<RefCell<PublicationState>>,
    latch: f64,
    settlement_latch: bool,
    update_after_settlement: bool,
}

impl Resolver {
    pub(crate) fn new(
        state: Rc<RefCell<PublicationState>>,
        latch: f64,
        settlement_latch: bool,
        update_after_settlement: bool,
    ) -> Self {
        Self {
            state,
            latch,
            settlement_latch,
            update_after_settlement,
        }
    }

    /// Fixes the dispatch-list size; counters stay zero until this runs.
    pub(crate) fn begin(&self, total: usize) {
        let mut state = self.state.borrow_mut();
        state.total = total;
        state.pending = total;
    }

    pub(crate) fn set_token(&self, token: Token) {
        self.state.borrow_mut().token = Some(token);
    }

    /// Records one outcome. Returns `false` when the outcome was dropped
    /// because the publication already settled.
    pub(crate) fn record(&self, outcome: Outcome) -> bool {
        let mut state = self.state.borrow_mut();
        if state.settled && !self.update_after_settlement {
            return false;
        }
        match outcome {
            Ok(value) => state.fulfilled.push(value),
            Err(value) => state.rejected.push(value),
        }
        state.pending = state.pending.saturating_sub(1);
        true
    }

    /// Evaluates the latch, settling the publication on a decision.
    ///
    /// With `F` fulfilled, `R` rejected, `P` pending: `T = F + R + P`,
    /// `S = F + R`, and `M = F + P` is the hypothetical maximum of
    /// fulfillments. Rejection (infeasibility) is tested before fulfillment.
    pub(crate) fn evaluate(&self) {
        let mut state = self.state.borrow_mut();
        if state.settled {
            return;
        }

        let fulfilled = state.fulfilled.len();
        let settled = fulfilled + state.rejected.len();
        let total = settled + state.pending;
        let reachable = fulfilled + state.pending;
        let latch = self.latch;

        let reject = if latch >= 1.0 {
            let limit = if self.settlement_latch { total } else { reachable };
            (limit as f64) < latch
        } else if total == 0 {
            // No subscribers: a fractional latch can never be reached
            true
        } else if self.settlement_latch {
            false
        } else {
            (reachable as f64) / (total as f64) < latch
        };

        if reject {
            let verdict = Err(state.rejected.clone());
            Self::settle(&mut state, verdict);
            return;
        }

        let reached = if self.settlement_latch { settled } else { fulfilled };
        let fulfill = if latch >= 1.0 {
            (reached as f64) >= latch
        } else {
            (reached as f64) / (total as f64) >= latch
        };

        if fulfill {
            let mut values = state.fulfilled.clone();
            if self.settlement_latch {
                values.extend(state.rejected.iter().cloned());
            }
            Self::settle(&mut state, Ok(values));
        }
    }

    fn settle(state: &mut PublicationState, verdict: Verdict) {
        state.settled = true;
        if let Some(sender) = state.sender.take() {
            let _ = sender.send(verdict);
        }
    }
}

/// The future returned by a publish.
///
/// Resolves with the latch verdict; exposes the live outcome counters, and
/// the persisted-message token when the publish was persisted. The counters
/// read zero until dispatch actually begins (a deferred publish dispatches
/// on a later scheduler turn).
#[derive(Debug)]
pub struct Publication {
    state: Rc<RefCell<PublicationState>>,
    receiver: oneshot::Receiver<Verdict>,
}

impl Publication {
    pub(crate) fn new() -> (Self, Rc<RefCell<PublicationState>>) {
        let (sender, receiver) = oneshot::channel();
        let state = Rc::new(RefCell::new(PublicationState {
            sender: Some(sender),
            ..PublicationState::default()
        }));
        (
            Self {
                state: state.clone(),
                receiver,
            },
            state,
        )
    }

    /// Returns a cloneable handle observing this publication's state.
    #[must_use]
    pub fn handle(&self) -> PublicationHandle {
        PublicationHandle {
            state: self.state.clone(),
        }
    }

    /// The persisted-message token, when published with `persist`.
    #[must_use]
    pub fn token(&self) -> Option<Token> {
        self.state.borrow().token.clone()
    }

    /// Count of fulfilled subscriber outcomes so far.
    #[must_use]
    pub fn fulfilled(&self) -> usize {
        self.state.borrow().fulfilled.len()
    }

    /// Count of rejected subscriber outcomes so far.
    #[must_use]
    pub fn rejected(&self) -> usize {
        self.state.borrow().rejected.len()
    }

    /// Count of dispatched-but-unsettled subscribers.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.borrow().pending
    }

    /// Whether the publication has settled.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.state.borrow().settled
    }
}

impl Future for Publication {
    type Output = Verdict;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(verdict)) => Poll::Ready(verdict),
            // Abandoned publications stay pending; unresolved latches never
            // produce a verdict
            Poll::Ready(Err(oneshot::Canceled)) | Poll::Pending => Poll::Pending,
        }
    }
}

/// A cloneable view of a publication's live state.
///
/// With `update_after_settlement`, counters and value lists keep updating
/// after the future has resolved; this handle is how those late outcomes
/// stay observable.
#[derive(Clone)]
pub struct PublicationHandle {
    state: Rc<RefCell<PublicationState>>,
}

impl PublicationHandle {
    #[must_use]
    pub fn fulfilled(&self) -> usize {
        self.state.borrow().fulfilled.len()
    }

    #[must_use]
    pub fn rejected(&self) -> usize {
        self.state.borrow().rejected.len()
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.borrow().pending
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.state.borrow().total
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.state.borrow().settled
    }

    #[must_use]
    pub fn token(&self) -> Option<Token> {
        self.state.borrow().token.clone()
    }

    /// Fulfillment values recorded so far, in completion order.
    #[must_use]
    pub fn fulfilled_values(&self) -> Vec<Payload> {
        self.state.borrow().fulfilled.clone()
    }

    /// Rejection values recorded so far, in completion order.
    #[must_use]
    pub fn rejected_values(&self) -> Vec<Payload> {
        self.state.borrow().rejected.clone()
    }
}

impl Debug for PublicationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct(stringify!(PublicationHandle))
            .field("fulfilled", &state.fulfilled.len())
            .field("rejected", &state.rejected.len())
            .field("pending", &state.pending)
            .field("settled", &state.settled)
            .finish()
    }
}
