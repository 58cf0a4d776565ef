use serde::{Deserialize, Serialize};

use super::PowerSnapshot;

/// Directional power flows between solar, grid, home and battery (all W, never negative)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowDecomposition {
    pub from_solar_to_home: f64,
    pub from_solar_to_battery: f64,
    pub from_solar_to_grid: f64,
    pub from_grid_to_home: f64,
    pub from_grid_to_battery: f64,
    pub from_battery_to_home: f64,
    pub from_battery_to_grid: f64,
}

impl FlowDecomposition {
    pub fn into_home(&self) -> f64 {
        self.from_solar_to_home + self.from_grid_to_home + self.from_battery_to_home
    }

    pub fn out_of_solar(&self) -> f64 {
        self.from_solar_to_home + self.from_solar_to_battery + self.from_solar_to_grid
    }

    /// Net battery power, positive = discharging (same convention as the snapshot)
    pub fn net_battery(&self) -> f64 {
        (self.from_battery_to_home + self.from_battery_to_grid)
            - (self.from_solar_to_battery + self.from_grid_to_battery)
    }

    /// Net grid power, positive = import (same convention as the snapshot)
    pub fn net_grid(&self) -> f64 {
        (self.from_grid_to_home + self.from_grid_to_battery)
            - (self.from_solar_to_grid + self.from_battery_to_grid)
    }
}

/// Attribute a snapshot's aggregate readings to directional flows.
///
/// Greedy allocation in physical preference order:
/// 1. Solar covers the home first
/// 2. A discharging battery covers what is left of the home
/// 3. The grid covers any remaining home need
/// 4. Surplus solar charges a charging battery, the rest is exported
/// 5. Charge demand not met by solar comes from the grid
/// 6. Battery discharge not consumed by the home is exported
///
/// Negative solar or load readings are clamped to zero. The grid reading is
/// not an input: for a balanced snapshot the grid flows reproduce it.
pub fn compute(snapshot: &PowerSnapshot) -> FlowDecomposition {
    let solar = non_negative(snapshot.solar_power);
    let load = non_negative(snapshot.load_power);
    let battery = if snapshot.battery_power.is_finite() {
        snapshot.battery_power
    } else {
        0.0
    };
    let discharge = battery.max(0.0);
    let charge_rate = (-battery).max(0.0);

    let from_solar_to_home = solar.min(load);
    let remaining_solar = solar - from_solar_to_home;
    let home_need = load - from_solar_to_home;

    let from_battery_to_home = discharge.min(home_need);
    let home_need = home_need - from_battery_to_home;
    let remaining_discharge = discharge - from_battery_to_home;

    let from_grid_to_home = home_need;

    let from_solar_to_battery = remaining_solar.min(charge_rate);
    let from_solar_to_grid = remaining_solar - from_solar_to_battery;

    let from_grid_to_battery = (charge_rate - from_solar_to_battery).max(0.0);
    let from_battery_to_grid = remaining_discharge;

    FlowDecomposition {
        from_solar_to_home,
        from_solar_to_battery,
        from_solar_to_grid,
        from_grid_to_home,
        from_grid_to_battery,
        from_battery_to_home,
        from_battery_to_grid,
    }
}

fn non_negative(watts: f64) -> f64 {
    // f64::max returns the other operand for NaN
    watts.max(0.0)
}
