use log::debug;

use crate::error::Result;
use crate::stream::ByteStream;

/// One unit of setup, validation or reading work run against a codec context.
pub type Procedure<C> = Box<dyn FnMut(&mut C, &mut dyn ByteStream) -> Result<()>>;

/// Ordered list of procedures, run once and then emptied.
pub struct ProcedureList<C> {
    procedures: Vec<(&'static str, Procedure<C>)>,
}

impl<C> Default for ProcedureList<C> {
    fn default() -> Self {
        Self {
            procedures: Vec::new(),
        }
    }
}

impl<C> ProcedureList<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &'static str, procedure: F)
    where
        F: FnMut(&mut C, &mut dyn ByteStream) -> Result<()> + 'static,
    {
        self.procedures.push((name, Box::new(procedure)));
    }

    /// Moves every procedure of `other` to the end of this list.
    pub fn append(&mut self, other: &mut ProcedureList<C>) {
        self.procedures.append(&mut other.procedures);
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }

    /// Runs every procedure in registration order, stopping at the first
    /// failure. The list is empty afterwards either way.
    pub fn run_all(&mut self, context: &mut C, stream: &mut dyn ByteStream) -> Result<()> {
        let procedures = std::mem::take(&mut self.procedures);
        for (name, mut procedure) in procedures {
            debug!("running procedure {}", name);
            procedure(context, stream)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodestreamError;
    use std::io::Cursor;

    #[test]
    fn test_run_all_in_order() {
        let mut list: ProcedureList<Vec<u32>> = ProcedureList::new();
        list.register("first", |log, _| {
            log.push(1);
            Ok(())
        });
        list.register("second", |log, _| {
            log.push(2);
            Ok(())
        });
        let mut log = Vec::new();
        let mut stream = Cursor::new(Vec::<u8>::new());
        list.run_all(&mut log, &mut stream).unwrap();
        assert_eq!(log, vec![1, 2]);
        assert!(list.is_empty());
    }

    #[test]
    fn test_run_all_stops_at_failure() {
        let mut list: ProcedureList<Vec<u32>> = ProcedureList::new();
        list.register("ok", |log, _| {
            log.push(1);
            Ok(())
        });
        list.register("fails", |_, _| {
            Err(CodestreamError::InvalidOperation("failing procedure"))
        });
        list.register("never", |log, _| {
            log.push(3);
            Ok(())
        });
        let mut log = Vec::new();
        let mut stream = Cursor::new(Vec::<u8>::new());
        assert!(list.run_all(&mut log, &mut stream).is_err());
        assert_eq!(log, vec![1]);
        assert!(list.is_empty());
    }

    #[test]
    fn test_procedure_reads_stream() {
        let mut list: ProcedureList<u16> = ProcedureList::new();
        list.register("read", |value, stream| {
            *value = stream.read_u16()?;
            Ok(())
        });
        let mut value = 0;
        let mut stream = Cursor::new(vec![0xFF, 0x4F]);
        list.run_all(&mut value, &mut stream).unwrap();
        assert_eq!(value, 0xFF4F);
    }
}
