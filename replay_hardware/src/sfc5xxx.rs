//! Sensirion SFC5xxx mass-flow controller driver over SHDLC.
//!
//! Transport-agnostic: anything `Read + Write` works (a serial TTY with the
//! `hardware` feature, an in-memory fake in tests).

use std::io::{Read, Write};

use replay_traits::Actuator;
use tracing::{debug, info};

use crate::error::{HwError, Result};
use crate::shdlc::ShdlcPort;

const CMD_SETPOINT: u8 = 0x00;
const CMD_READ_MEASURED: u8 = 0x08;
const CMD_USER_DEFINED_MEDIUM_UNIT: u8 = 0x21;
const CMD_DEVICE_INFO: u8 = 0xD0;

const INFO_PRODUCT_NAME: u8 = 0x01;
const INFO_ARTICLE_CODE: u8 = 0x02;
const INFO_SERIAL_NUMBER: u8 = 0x03;

/// Value scaling selector shared by setpoint and measurement commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Scaling {
    Normalized = 0,
    Physical = 1,
    UserDefined = 2,
}

/// User-defined medium unit: `prefix` is a power of ten, `unit` and
/// `time_base` are the device's unit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediumUnit {
    pub prefix: i8,
    pub unit: u8,
    pub time_base: u8,
}

impl MediumUnit {
    /// Standard cubic centimetres per minute (milli · standard litre / minute).
    pub const SCCM: Self = Self {
        prefix: -3,
        unit: 1,
        time_base: 4,
    };
}

/// Identity strings reported by the device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub product_name: String,
    pub article_code: String,
    pub serial_number: String,
}

pub struct Sfc5xxx<T> {
    label: String,
    port: Option<ShdlcPort<T>>,
}

impl<T: Read + Write> Sfc5xxx<T> {
    pub fn new(label: impl Into<String>, transport: T, address: u8) -> Self {
        Self {
            label: label.into(),
            port: Some(ShdlcPort::new(transport, address)),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn port(&mut self) -> Result<&mut ShdlcPort<T>> {
        self.port.as_mut().ok_or(HwError::Closed)
    }

    pub fn set_setpoint_scaled(&mut self, value: f32, scaling: Scaling) -> Result<()> {
        let mut data = Vec::with_capacity(5);
        data.push(scaling as u8);
        data.extend_from_slice(&value.to_be_bytes());
        self.port()?.transceive(CMD_SETPOINT, &data)?;
        debug!(mfc = %self.label, value, "setpoint written");
        Ok(())
    }

    pub fn read_measured_scaled(&mut self, scaling: Scaling) -> Result<f32> {
        let data = self.port()?.transceive(CMD_READ_MEASURED, &[scaling as u8])?;
        let bytes: [u8; 4] = data
            .as_slice()
            .try_into()
            .map_err(|_| HwError::Frame(format!("measured value of {} bytes", data.len())))?;
        Ok(f32::from_be_bytes(bytes))
    }

    pub fn set_user_defined_medium_unit(&mut self, unit: MediumUnit) -> Result<()> {
        let data = [unit.prefix as u8, unit.unit, unit.time_base];
        self.port()?.transceive(CMD_USER_DEFINED_MEDIUM_UNIT, &data)?;
        Ok(())
    }

    fn info_string(&mut self, index: u8) -> Result<String> {
        let data = self.port()?.transceive(CMD_DEVICE_INFO, &[index])?;
        let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        Ok(String::from_utf8_lossy(&data[..end]).into_owned())
    }

    pub fn device_info(&mut self) -> Result<DeviceInfo> {
        Ok(DeviceInfo {
            product_name: self.info_string(INFO_PRODUCT_NAME)?,
            article_code: self.info_string(INFO_ARTICLE_CODE)?,
            serial_number: self.info_string(INFO_SERIAL_NUMBER)?,
        })
    }

    /// Configure sccm as the user-defined unit and log the device identity.
    pub fn configure_sccm(&mut self) -> Result<DeviceInfo> {
        self.set_user_defined_medium_unit(MediumUnit::SCCM)?;
        let info = self.device_info()?;
        info!(
            mfc = %self.label,
            serial = %info.serial_number,
            product = %info.product_name,
            article = %info.article_code,
            "MFC connected"
        );
        Ok(info)
    }
}

impl<T: Read + Write> Actuator for Sfc5xxx<T> {
    fn set_setpoint(&mut self, value: f64) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.set_setpoint_scaled(value as f32, Scaling::UserDefined)
            .map_err(Into::into)
    }

    fn read_measured_value(&mut self) -> std::result::Result<f64, Box<dyn std::error::Error + Send + Sync>> {
        self.read_measured_scaled(Scaling::UserDefined)
            .map(f64::from)
            .map_err(Into::into)
    }

    fn close(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        match self.port.take() {
            Some(port) => {
                drop(port.into_inner());
                debug!(mfc = %self.label, "port closed");
                Ok(())
            }
            None => Err(Box::new(HwError::Closed)),
        }
    }
}
