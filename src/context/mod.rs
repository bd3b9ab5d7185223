//! Ambient device context: location and device status are owned by the UI side
//! and published through `watch` channels. The chat session only ever reads the
//! latest value, at send time.

use log::{ debug, warn };
use tokio::sync::watch;

use crate::models::device::{ Coordinates, DeviceStatus, StatusUpdate };

/// Writer half, held by whatever collects location and device status.
#[derive(Debug)]
pub struct DeviceFeeds {
    location: watch::Sender<Option<Coordinates>>,
    status: watch::Sender<DeviceStatus>,
}

/// Reader half, injected into a chat session.
#[derive(Debug, Clone)]
pub struct DeviceContext {
    location: watch::Receiver<Option<Coordinates>>,
    status: watch::Receiver<DeviceStatus>,
}

pub fn channel(initial_status: DeviceStatus) -> (DeviceFeeds, DeviceContext) {
    let (location_tx, location_rx) = watch::channel(None);
    let (status_tx, status_rx) = watch::channel(initial_status);
    (
        DeviceFeeds { location: location_tx, status: status_tx },
        DeviceContext { location: location_rx, status: status_rx },
    )
}

impl DeviceFeeds {
    /// Records a granted position. There is no way to revoke it afterwards.
    pub fn grant_location(&self, coordinates: Coordinates) {
        debug!("Location updated to {}", coordinates.formatted());
        self.location.send_replace(Some(coordinates));
    }

    /// Provider failures only reach the log; the transcript never sees them.
    pub fn location_failed(&self, message: &str) {
        warn!("Location unavailable: {}", message);
    }

    pub fn update_status(&self, update: StatusUpdate) {
        self.status.send_modify(|status| status.apply(update));
    }
}

impl DeviceContext {
    pub fn location(&self) -> Option<Coordinates> {
        *self.location.borrow()
    }

    pub fn status(&self) -> DeviceStatus {
        self.status.borrow().clone()
    }
}
