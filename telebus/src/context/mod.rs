use crate::error::ContextError;
use crate::server::identity::ServerIdentity;
use crate::types::UnitId;

mod bank;

pub use bank::RegisterBank;

/// Layout of the four banks served by a [`SlaveContext`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContextConfig {
    /// Address of the first value in every bank
    pub start: u16,
    /// Number of values in every bank
    pub count: u16,
    /// Initial value of every register; bit banks start as `fill != 0`
    pub fill: u16,
    /// The only unit id the context answers to
    pub unit_id: UnitId,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            start: 0,
            count: 4,
            fill: 31416,
            unit_id: UnitId::default(),
        }
    }
}

/// Register table of a single Modbus slave
///
/// Every read and write from the server and the updater goes through this type.
/// It is `Send + Sync` and meant to be shared in an `Arc`.
#[derive(Debug)]
pub struct SlaveContext {
    unit_id: UnitId,
    discrete_inputs: RegisterBank<bool>,
    coils: RegisterBank<bool>,
    holding_registers: RegisterBank<u16>,
    input_registers: RegisterBank<u16>,
    identity: Option<ServerIdentity>,
}

impl SlaveContext {
    /// Create the four banks described by `config`
    pub fn new(config: ContextConfig) -> Self {
        let len = config.count as usize;
        let bit = config.fill != 0;
        Self {
            unit_id: config.unit_id,
            discrete_inputs: RegisterBank::filled(config.start, len, bit),
            coils: RegisterBank::filled(config.start, len, bit),
            holding_registers: RegisterBank::filled(config.start, len, config.fill),
            input_registers: RegisterBank::filled(config.start, len, config.fill),
            identity: None,
        }
    }

    /// Serve Read Device Identification with `identity`
    pub fn with_identity(mut self, identity: ServerIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Unit id served by this context
    pub fn unit_id(&self) -> UnitId {
        self.unit_id
    }

    /// Address of the first input register
    pub fn input_registers_start(&self) -> u16 {
        self.input_registers.start()
    }

    pub(crate) fn identity(&self) -> Option<&ServerIdentity> {
        self.identity.as_ref()
    }

    /// Fails with [`ContextError::IllegalSlaveId`] for any unit other than the one served
    pub fn check_unit_id(&self, unit_id: UnitId) -> Result<(), ContextError> {
        if unit_id != self.unit_id {
            return Err(ContextError::IllegalSlaveId {
                requested: unit_id,
                served: self.unit_id,
            });
        }
        Ok(())
    }

    /// Read `count` discrete inputs beginning at `start`
    pub fn read_discrete_inputs(&self, start: u16, count: u16) -> Result<Vec<bool>, ContextError> {
        Ok(self.discrete_inputs.get(start, count as usize)?)
    }

    /// Read `count` coils beginning at `start`
    pub fn read_coils(&self, start: u16, count: u16) -> Result<Vec<bool>, ContextError> {
        Ok(self.coils.get(start, count as usize)?)
    }

    /// Write coils beginning at `start`
    pub fn write_coils(&self, start: u16, values: &[bool]) -> Result<(), ContextError> {
        Ok(self.coils.set(start, values)?)
    }

    /// Read `count` holding registers beginning at `start`
    pub fn read_holding_registers(&self, start: u16, count: u16) -> Result<Vec<u16>, ContextError> {
        Ok(self.holding_registers.get(start, count as usize)?)
    }

    /// Write holding registers beginning at `start`
    pub fn write_holding_registers(&self, start: u16, values: &[u16]) -> Result<(), ContextError> {
        Ok(self.holding_registers.set(start, values)?)
    }

    /// Read `count` input registers beginning at `start`
    pub fn read_input_registers(&self, start: u16, count: u16) -> Result<Vec<u16>, ContextError> {
        Ok(self.input_registers.get(start, count as usize)?)
    }

    /// Write input registers beginning at `start`
    ///
    /// Input registers are read-only on the wire; this is how the updater publishes readings.
    pub fn write_input_registers(&self, start: u16, values: &[u16]) -> Result<(), ContextError> {
        Ok(self.input_registers.set(start, values)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::ExceptionCode;

    fn context(start: u16, count: u16) -> SlaveContext {
        SlaveContext::new(ContextConfig {
            start,
            count,
            ..Default::default()
        })
    }

    #[test]
    fn banks_start_with_the_fill_value() {
        let ctx = context(0, 4);
        assert_eq!(ctx.read_input_registers(0, 4).unwrap(), vec![31416; 4]);
        assert_eq!(ctx.read_holding_registers(0, 4).unwrap(), vec![31416; 4]);
        assert_eq!(ctx.read_coils(0, 4).unwrap(), vec![true; 4]);
        assert_eq!(ctx.read_discrete_inputs(0, 4).unwrap(), vec![true; 4]);
    }

    #[test]
    fn zero_fill_clears_bit_banks() {
        let ctx = SlaveContext::new(ContextConfig {
            fill: 0,
            ..Default::default()
        });
        assert_eq!(ctx.read_coils(0, 4).unwrap(), vec![false; 4]);
    }

    #[test]
    fn write_then_read_round_trips() {
        let ctx = context(100, 5);
        ctx.write_holding_registers(101, &[0xCAFE, 0xBEEF]).unwrap();
        ctx.write_coils(104, &[false]).unwrap();
        assert_eq!(
            ctx.read_holding_registers(100, 3).unwrap(),
            vec![31416, 0xCAFE, 0xBEEF]
        );
        assert_eq!(ctx.read_coils(103, 2).unwrap(), vec![true, false]);
    }

    #[test]
    fn out_of_range_is_illegal_data_address_and_leaves_banks_unchanged() {
        let ctx = context(0, 5);
        let err = ctx.write_input_registers(4, &[1, 2]).unwrap_err();
        assert!(matches!(err, ContextError::IllegalDataAddress(_)));
        assert_eq!(ExceptionCode::from(err), ExceptionCode::IllegalDataAddress);
        assert_eq!(ctx.read_input_registers(0, 5).unwrap(), vec![31416; 5]);
        assert!(ctx.read_input_registers(10, 1).is_err());
    }

    #[test]
    fn only_the_configured_unit_is_served() {
        let ctx = context(0, 5);
        assert_eq!(ctx.check_unit_id(UnitId::new(1)), Ok(()));
        let err = ctx.check_unit_id(UnitId::new(2)).unwrap_err();
        assert_eq!(
            err,
            ContextError::IllegalSlaveId {
                requested: UnitId::new(2),
                served: UnitId::new(1)
            }
        );
        assert_eq!(ExceptionCode::from(err), ExceptionCode::IllegalFunction);
    }
}
