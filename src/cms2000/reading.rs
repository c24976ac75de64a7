use serde::Serialize;

use crate::cms2000::packet::Field;

/// One telemetry snapshot from the inverter, in physical units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Reading {
    pub temp: f64,    // °C
    pub e_today: f64, // kWh
    pub e_now: f64,
    pub e_total: f64, // kWh
    pub v_dc: f64,
    pub i_ac: f64,
    pub v_ac: f64,
    pub f_ac: f64,
    pub p_ac: f64,
    pub z_ac: f64,
    pub h_total: f64,
}

impl Reading {
    pub(crate) fn set(&mut self, field: Field, value: f64) {
        let slot = match field {
            Field::Temp => &mut self.temp,
            Field::EToday => &mut self.e_today,
            Field::ENow => &mut self.e_now,
            Field::ETotal => &mut self.e_total,
            Field::Vdc => &mut self.v_dc,
            Field::Iac => &mut self.i_ac,
            Field::Vac => &mut self.v_ac,
            Field::Fac => &mut self.f_ac,
            Field::Pac => &mut self.p_ac,
            Field::Zac => &mut self.z_ac,
            Field::HTotal => &mut self.h_total,
        };
        *slot = value;
    }

    /// True when the inverter has never reported any lifetime energy,
    /// which is what it sends while asleep overnight.
    pub fn is_idle(&self) -> bool {
        self.e_total == 0.0
    }
}

impl std::fmt::Display for Reading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "temp: {}, etoday: {}, enow: {}, etotal: {}, vdc: {}, iac: {}, vac: {}, fac: {}, pac: {}, zac: {}, htotal: {}",
            self.temp,
            self.e_today,
            self.e_now,
            self.e_total,
            self.v_dc,
            self.i_ac,
            self.v_ac,
            self.f_ac,
            self.p_ac,
            self.z_ac,
            self.h_total
        )
    }
}
