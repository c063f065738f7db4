//! Thin façade over the message-passing transport (`mpi`/rsmpi), so the
//! dispatcher and worker name operations the way the rest of the crate
//! thinks about them: rank/size, barrier, tagged non-blocking send/recv,
//! probe. Everything below is a direct pass-through; no buffering or
//! protocol logic lives here.

use mpi::environment::Universe;
use mpi::topology::SimpleCommunicator;
pub use mpi::traits::*;

/// One rank's view of the cluster communicator. Constructed once at
/// startup; `rank() == 0` is the coordinator, everything else is a worker.
pub struct Transport {
    pub world: SimpleCommunicator,
}

impl Transport {
    /// Initialize the message-passing environment. The returned `Universe`
    /// must be kept alive for the whole process lifetime — dropping it
    /// finalizes the transport.
    pub fn init() -> (Universe, Transport) {
        let universe = mpi::initialize().expect("could not initialize the message-passing environment");
        let world = universe.world();
        (universe, Transport { world })
    }

    pub fn rank(&self) -> i32 {
        self.world.rank()
    }

    pub fn size(&self) -> i32 {
        self.world.size()
    }

    pub fn is_coordinator(&self) -> bool {
        self.rank() == 0
    }

    /// Block until every rank has reached this call.
    pub fn barrier(&self) {
        self.world.barrier();
    }
}
