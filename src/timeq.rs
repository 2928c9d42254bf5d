/*
Time-queue helpers for the simulated memory.

The delay model itself is cycle-driven (every component advances exactly one tick per
`tick_one`).  The real-memory stub, however, only needs a coarse service law: a base latency
plus a throughput component expressed in bytes-per-cycle.  A `TimedServer` implements that law
over a bounded FIFO and hands out a `Ticket` for every accepted request, so the stub can release
its responses in order once their ticket matures.
*/

use std::collections::VecDeque;

pub type Cycle = u64;

// Result of queueing a request with a timed server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    issued_at: Cycle,
    ready_at: Cycle,
    size_bytes: u32,
}

impl Ticket {
    fn new(issued_at: Cycle, ready_at: Cycle, size_bytes: u32) -> Self {
        Self {
            issued_at,
            ready_at,
            size_bytes,
        }
    }

    pub fn issued_at(&self) -> Cycle {
        self.issued_at
    }

    // Cycle at which the server makes the payload available downstream.
    pub fn ready_at(&self) -> Cycle {
        self.ready_at
    }

    pub fn size_bytes(&self) -> u32 {
        self.size_bytes
    }

    pub fn is_ready(&self, now: Cycle) -> bool {
        now >= self.ready_at
    }
}

#[derive(Debug)]
pub struct ServiceRequest<T> {
    pub payload: T,
    pub size_bytes: u32,
}

impl<T> ServiceRequest<T> {
    pub fn new(payload: T, size_bytes: u32) -> Self {
        Self { payload, size_bytes }
    }
}

#[derive(Debug)]
pub struct ServiceResult<T> {
    pub payload: T,
    pub ticket: Ticket,
}

// Reasons why the server rejected a request
#[derive(Debug)]
pub enum Backpressure<T> {
    // The bounded FIFO is full
    QueueFull { request: ServiceRequest<T>, capacity: usize },
}

impl<T> Backpressure<T> {
    // Recover the underlying request so it can be retried later.
    pub fn into_request(self) -> ServiceRequest<T> {
        match self {
            Backpressure::QueueFull { request, .. } => request,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
    // Fixed latency added to every request
    pub base_latency: Cycle,
    // Throughput
    pub bytes_per_cycle: u32,
    // Maximum number of outstanding requests the server will accept
    pub queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_latency: 0,
            bytes_per_cycle: 1,
            queue_capacity: 1,
        }
    }
}

#[derive(Debug)]
struct Inflight<T> {
    payload: T,
    ticket: Ticket,
}

// Single-lane server that enforces the configured latency/bandwidth budget and keeps track of
// outstanding work using a FIFO.  Completions always leave in acceptance order.
#[derive(Debug)]
pub struct TimedServer<T> {
    config: ServerConfig,
    inflight: VecDeque<Inflight<T>>,
    busy_until: Cycle,
}

impl<T> TimedServer<T> {
    pub fn new(config: ServerConfig) -> Self {
        assert!(config.bytes_per_cycle > 0, "bytes_per_cycle must be > 0");
        assert!(config.queue_capacity > 0, "queue_capacity must be > 0");
        Self {
            config,
            inflight: VecDeque::with_capacity(config.queue_capacity),
            busy_until: 0,
        }
    }

    // Attempt to enqueue a request at the provided cycle.
    pub fn try_enqueue(
        &mut self,
        now: Cycle,
        request: ServiceRequest<T>,
    ) -> Result<Ticket, Backpressure<T>> {
        if self.inflight.len() >= self.config.queue_capacity {
            return Err(Backpressure::QueueFull {
                request,
                capacity: self.config.queue_capacity,
            });
        }

        // Transfers are serialized on the bandwidth component; the base latency overlaps.
        let start = self.busy_until.max(now);
        let transfer = ceil_div_u64(request.size_bytes as u64, self.config.bytes_per_cycle as u64);
        self.busy_until = start.saturating_add(transfer);
        let ready_at = self.busy_until.saturating_add(self.config.base_latency);
        let ticket = Ticket::new(now, ready_at, request.size_bytes);

        self.inflight.push_back(Inflight {
            payload: request.payload,
            ticket,
        });

        Ok(ticket)
    }

    // Drain any requests that have completed by `now`, in FIFO order.
    pub fn service_ready<F>(&mut self, now: Cycle, mut callback: F)
    where
        F: FnMut(ServiceResult<T>),
    {
        while let Some(front) = self.inflight.pop_front() {
            if !front.ticket.is_ready(now) {
                self.inflight.push_front(front);
                break;
            }
            callback(ServiceResult {
                payload: front.payload,
                ticket: front.ticket,
            });
        }
    }

    pub fn outstanding(&self) -> usize {
        self.inflight.len()
    }

    pub fn is_full(&self) -> bool {
        self.inflight.len() >= self.config.queue_capacity
    }

    pub fn oldest_ticket(&self) -> Option<&Ticket> {
        self.inflight.front().map(|inflight| &inflight.ticket)
    }

    pub fn reset(&mut self) {
        self.inflight.clear();
        self.busy_until = 0;
    }
}

fn ceil_div_u64(nom: u64, denom: u64) -> Cycle {
    debug_assert!(denom > 0);
    (nom + denom - 1) / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(base_latency: Cycle, bytes_per_cycle: u32, queue_capacity: usize) -> TimedServer<u32> {
        TimedServer::new(ServerConfig {
            base_latency,
            bytes_per_cycle,
            queue_capacity,
        })
    }

    #[test]
    fn ticket_accounts_for_latency_and_bandwidth() {
        let mut srv = server(5, 4, 4);
        let ticket = srv.try_enqueue(10, ServiceRequest::new(1, 8)).unwrap();
        assert_eq!(10, ticket.issued_at());
        assert_eq!(10 + 2 + 5, ticket.ready_at());
        assert_eq!(8, ticket.size_bytes());
    }

    #[test]
    fn back_to_back_requests_serialize_on_bandwidth() {
        let mut srv = server(3, 4, 4);
        let first = srv.try_enqueue(0, ServiceRequest::new(1, 4)).unwrap();
        let second = srv.try_enqueue(0, ServiceRequest::new(2, 4)).unwrap();
        assert_eq!(4, first.ready_at());
        assert_eq!(5, second.ready_at());
    }

    #[test]
    fn queue_full_returns_request() {
        let mut srv = server(1, 4, 1);
        srv.try_enqueue(0, ServiceRequest::new(1, 4)).unwrap();
        assert!(srv.is_full());
        let err = srv.try_enqueue(0, ServiceRequest::new(2, 4)).unwrap_err();
        assert_eq!(2, err.into_request().payload);
    }

    #[test]
    fn service_ready_drains_in_order_only_when_mature() {
        let mut srv = server(2, 4, 4);
        srv.try_enqueue(0, ServiceRequest::new(7, 4)).unwrap();
        srv.try_enqueue(0, ServiceRequest::new(8, 4)).unwrap();
        let mut seen = Vec::new();
        srv.service_ready(2, |r| seen.push(r.payload));
        assert!(seen.is_empty());
        srv.service_ready(3, |r| seen.push(r.payload));
        assert_eq!(vec![7], seen);
        srv.service_ready(10, |r| seen.push(r.payload));
        assert_eq!(vec![7, 8], seen);
        assert_eq!(0, srv.outstanding());
        assert!(srv.oldest_ticket().is_none());
    }

    #[test]
    fn reset_clears_inflight() {
        let mut srv = server(2, 4, 4);
        srv.try_enqueue(0, ServiceRequest::new(7, 4)).unwrap();
        srv.reset();
        assert_eq!(0, srv.outstanding());
        let ticket = srv.try_enqueue(0, ServiceRequest::new(8, 4)).unwrap();
        assert_eq!(3, ticket.ready_at());
    }
}
