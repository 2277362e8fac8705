//! # Bluetooth LE Transport
//!
//! GATT link to the printer through [`bluest`]:
//!
//! | Role | UUID |
//! |------|------|
//! | Service | `000018f0-0000-1000-8000-00805f9b34fb` |
//! | Write (no response) | `00002af1-0000-1000-8000-00805f9b34fb` |
//! | Notify | `00002af0-0000-1000-8000-00805f9b34fb` |
//!
//! Replies arrive as notification fragments, often 20 bytes or fewer, so a
//! single reply may be split across several callbacks.
//!
//! Built only with the default `ble` feature; without it every call reports
//! [`FicheroError::TransportUnavailable`](crate::error::FicheroError).

use std::time::Duration;

/// How long discovery listens for advertisements.
pub const SCAN_TIMEOUT: Duration = Duration::from_secs(8);

#[cfg(feature = "ble")]
pub use imp::{BleTransport, find_printer};

#[cfg(feature = "ble")]
mod imp {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Mutex, PoisonError};

    use async_trait::async_trait;
    use bluest::{Adapter, Characteristic, Device};
    use futures_util::StreamExt;
    use log::{debug, info, warn};
    use tokio::sync::oneshot;
    use tokio::task::JoinHandle;

    use super::SCAN_TIMEOUT;
    use crate::error::{FicheroError, Result};
    use crate::printer::PrinterConfig;
    use crate::transport::{CONNECT_TIMEOUT, Notification, NotifyCallback, Transport, TransportKind};

    /// A connected GATT link.
    pub struct BleTransport {
        adapter: Adapter,
        device: Device,
        write_char: Characteristic,
        notify_char: Characteristic,
        listener: Mutex<Option<JoinHandle<()>>>,
        subscriber: Mutex<Option<NotifyCallback>>,
        closed: AtomicBool,
    }

    async fn default_adapter() -> Result<Adapter> {
        let adapter = Adapter::default().await.ok_or_else(|| {
            FicheroError::TransportUnavailable("no Bluetooth adapter found".to_string())
        })?;
        adapter
            .wait_available()
            .await
            .map_err(|e| FicheroError::TransportUnavailable(e.to_string()))?;
        Ok(adapter)
    }

    /// Normalise a platform device id for address comparison.
    ///
    /// BlueZ ids look like `hci0/dev_AA_BB_CC_DD_EE_FF`.
    fn id_matches(id: &str, address: &str) -> bool {
        id.to_uppercase()
            .replace('_', ":")
            .contains(&address.to_uppercase())
    }

    fn is_printer(device: &Device, name: Option<&str>, address: Option<&str>) -> bool {
        match address {
            Some(address) => id_matches(&device.id().to_string(), address),
            None => name.is_some_and(|name| PrinterConfig::D11S.matches_name(name)),
        }
    }

    /// Find a printer by address, or by advertised name prefix when no
    /// address is given. Already-connected devices are checked first.
    pub async fn find_printer(adapter: &Adapter, address: Option<&str>) -> Result<Device> {
        if let Ok(devices) = adapter.connected_devices().await {
            for device in devices {
                let name = device.name().ok();
                if is_printer(&device, name.as_deref(), address) {
                    info!("Using already-connected printer {:?}", name);
                    return Ok(device);
                }
            }
        }

        info!("Scanning for printer ({:?})...", SCAN_TIMEOUT);
        let mut scan = adapter
            .scan(&[])
            .await
            .map_err(|e| FicheroError::Transport(format!("scan failed: {e}")))?;

        let found = tokio::time::timeout(SCAN_TIMEOUT, async {
            while let Some(advert) = scan.next().await {
                let name = advert
                    .adv_data
                    .local_name
                    .clone()
                    .or_else(|| advert.device.name().ok());
                debug!("Saw {:?} rssi={:?}", name, advert.rssi);
                if is_printer(&advert.device, name.as_deref(), address) {
                    info!("Found {} ({})", name.as_deref().unwrap_or("?"), advert.device.id());
                    return Some(advert.device);
                }
            }
            None
        })
        .await;

        match found {
            Ok(Some(device)) => Ok(device),
            _ => Err(FicheroError::NotFound(match address {
                Some(address) => format!("no device with address {address}"),
                None => format!(
                    "no device named {} within {:?}",
                    PrinterConfig::D11S.name_prefixes.join(" or "),
                    SCAN_TIMEOUT
                ),
            })),
        }
    }

    async fn attach(adapter: &Adapter, device: &Device) -> Result<(Characteristic, Characteristic)> {
        let config = PrinterConfig::D11S;
        let fail = |e: bluest::Error| FicheroError::ConnectFailure(e.to_string());

        adapter.connect_device(device).await.map_err(fail)?;

        let service = device
            .services()
            .await
            .map_err(fail)?
            .into_iter()
            .find(|s| s.uuid() == config.service)
            .ok_or_else(|| FicheroError::ConnectFailure("printer service not found".to_string()))?;

        let mut write_char = None;
        let mut notify_char = None;
        for characteristic in service.characteristics().await.map_err(fail)? {
            let uuid = characteristic.uuid();
            if uuid == config.write_char {
                write_char = Some(characteristic);
            } else if uuid == config.notify_char {
                notify_char = Some(characteristic);
            }
        }

        match (write_char, notify_char) {
            (Some(w), Some(n)) => Ok((w, n)),
            _ => Err(FicheroError::ConnectFailure(
                "printer characteristics not found".to_string(),
            )),
        }
    }

    async fn release(adapter: &Adapter, device: &Device) {
        if let Err(e) = adapter.disconnect_device(device).await {
            warn!("Disconnect failed: {}", e);
        }
    }

    impl BleTransport {
        /// Discover and connect. Fails with `ConnectFailure` if the GATT
        /// link is not usable within [`CONNECT_TIMEOUT`]; the device is
        /// disconnected again before returning.
        pub async fn connect(address: Option<&str>) -> Result<Self> {
            let adapter = default_adapter().await?;
            let device = find_printer(&adapter, address).await?;

            let attached = tokio::time::timeout(CONNECT_TIMEOUT, attach(&adapter, &device)).await;
            let (write_char, notify_char) = match attached {
                Ok(Ok(chars)) => chars,
                Ok(Err(e)) => {
                    release(&adapter, &device).await;
                    return Err(e);
                }
                Err(_) => {
                    release(&adapter, &device).await;
                    return Err(FicheroError::ConnectFailure(format!(
                        "timed out after {CONNECT_TIMEOUT:?}"
                    )));
                }
            };
            info!("Connected to {}", device.id());

            Ok(Self {
                adapter,
                device,
                write_char,
                notify_char,
                listener: Mutex::new(None),
                subscriber: Mutex::new(None),
                closed: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl Transport for BleTransport {
        async fn write(&self, data: &[u8]) -> Result<()> {
            if self.closed.load(Ordering::Acquire) {
                return Err(FicheroError::TransportClosed);
            }
            self.write_char
                .write_without_response(data)
                .await
                .map_err(|e| FicheroError::Transport(format!("Write failed: {e}")))
        }

        async fn subscribe(&self, callback: NotifyCallback) -> Result<()> {
            if self.closed.load(Ordering::Acquire) {
                return Err(FicheroError::TransportClosed);
            }
            let characteristic = self.notify_char.clone();
            let deliver = callback.clone();
            let (ready_tx, ready_rx) = oneshot::channel();

            let handle = tokio::spawn(async move {
                let mut stream = match characteristic.notify().await {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                while let Some(item) = stream.next().await {
                    match item {
                        Ok(fragment) => deliver(Notification::Data(fragment)),
                        Err(e) => {
                            warn!("Notification stream failed: {}", e);
                            deliver(Notification::Error(e.to_string()));
                            return;
                        }
                    }
                }
                deliver(Notification::Closed);
            });

            // Notifications must be live before the first command goes out.
            match ready_rx.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(FicheroError::Transport(format!("subscribe failed: {e}"))),
                Err(_) => return Err(FicheroError::Transport("subscribe task ended".to_string())),
            }

            *self.subscriber.lock().unwrap_or_else(PoisonError::into_inner) = Some(callback);
            let previous = self
                .listener
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .replace(handle);
            if let Some(previous) = previous {
                previous.abort();
            }
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            if self.closed.swap(true, Ordering::AcqRel) {
                return Ok(());
            }
            let listener = self.listener.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some(listener) = listener {
                listener.abort();
            }
            release(&self.adapter, &self.device).await;
            let subscriber = self
                .subscriber
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(callback) = subscriber {
                callback(Notification::Closed);
            }
            info!("Closed BLE link to {}", self.device.id());
            Ok(())
        }

        fn kind(&self) -> TransportKind {
            TransportKind::Ble
        }
    }

    impl Drop for BleTransport {
        fn drop(&mut self) {
            if let Some(listener) = self.listener.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
                listener.abort();
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_id_matches_bluez_path() {
            assert!(id_matches("hci0/dev_AA_BB_CC_DD_EE_FF", "aa:bb:cc:dd:ee:ff"));
            assert!(id_matches("AA:BB:CC:DD:EE:FF", "AA:BB:CC:DD:EE:FF"));
            assert!(!id_matches("hci0/dev_AA_BB_CC_DD_EE_00", "AA:BB:CC:DD:EE:FF"));
        }
    }
}

#[cfg(not(feature = "ble"))]
pub use stub::BleTransport;

#[cfg(not(feature = "ble"))]
mod stub {
    use async_trait::async_trait;

    use crate::error::{FicheroError, Result};
    use crate::transport::{NotifyCallback, Transport, TransportKind};

    /// Placeholder when built without the `ble` feature.
    pub struct BleTransport {
        _private: (),
    }

    fn unavailable() -> FicheroError {
        FicheroError::TransportUnavailable("built without the `ble` feature".to_string())
    }

    impl BleTransport {
        pub async fn connect(_address: Option<&str>) -> Result<Self> {
            Err(unavailable())
        }
    }

    #[async_trait]
    impl Transport for BleTransport {
        async fn write(&self, _data: &[u8]) -> Result<()> {
            Err(unavailable())
        }

        async fn subscribe(&self, _callback: NotifyCallback) -> Result<()> {
            Err(unavailable())
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }

        fn kind(&self) -> TransportKind {
            TransportKind::Ble
        }
    }
}
