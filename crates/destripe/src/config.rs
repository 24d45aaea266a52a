//! Construction-argument parsing and validation
//!
//! A destripe mapping is described by a positional, whitespace-separated
//! argument line of exactly six tokens:
//!
//! ```text
//! <stripe_count> <stripe_index> <chunk_size> <device_count> <device> <device_start>
//!      2..=16     0..count-1     pow2, >=page    must be 1    name     sectors
//! ```
//!
//! Validation fails fast on the first violation, in argument order, with
//! a descriptive reason. Nothing is allocated or resolved here; device
//! acquisition happens in [`crate::target::DestripeTarget::new`] against
//! the parsed result.

use crate::MIN_CHUNK_SECTORS;
use crate::error::ConstructError;

/// Longest target name cached for error-source identification.
pub const NAME_MAXLEN: usize = 16;

/// Host-supplied description of the virtual target being constructed.
#[derive(Debug, Clone)]
pub struct TargetParams {
    /// Mapping name, used in status and log output
    pub name: String,
    /// First logical sector of the mapped region within the virtual device
    pub start: u64,
    /// Mapped region length in sectors
    pub len: u64,
}

/// A validated construction argument line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestripeArgs {
    pub stripe_count: u32,
    pub stripe_index: u32,
    /// Chunk size in sectors; power of two, at least one page
    pub chunk_size: u64,
    /// Backing device identifier, resolver-interpreted
    pub device: String,
    /// Start sector of the stripe set on the backing device
    pub physical_start: u64,
}

/// Parse and validate a construction argument line against the target
/// parameters. Checks run in order and stop at the first violation.
pub fn parse_args(params: &TargetParams, args: &[&str]) -> Result<DestripeArgs, ConstructError> {
    if args.len() < 3 {
        return Err(ConstructError::NotEnoughArguments);
    }

    let stripe_count: u32 = args[0]
        .parse()
        .map_err(|_| ConstructError::InvalidStripeCount)?;
    if !(2..=16).contains(&stripe_count) {
        return Err(ConstructError::InvalidStripeCount);
    }

    let stripe_index: u32 = args[1]
        .parse()
        .map_err(|_| ConstructError::InvalidStripeIndex)?;
    if stripe_index >= stripe_count {
        return Err(ConstructError::InvalidStripeIndex);
    }

    let chunk_size: u64 = args[2]
        .parse()
        .map_err(|_| ConstructError::InvalidChunkSize)?;
    if chunk_size == 0 {
        return Err(ConstructError::InvalidChunkSize);
    }
    if !chunk_size.is_power_of_two() || chunk_size < MIN_CHUNK_SECTORS {
        return Err(ConstructError::UnalignedChunkSize {
            min: MIN_CHUNK_SECTORS,
        });
    }

    if params.len % chunk_size != 0 {
        return Err(ConstructError::UnalignedLength);
    }

    // One destination device: a count token plus a <device> <start> pair.
    if args.len() != 6 {
        return Err(ConstructError::WrongArgumentCount);
    }
    if args[3].parse::<u32>() != Ok(1) {
        return Err(ConstructError::InvalidDeviceCount);
    }

    if params.name.len() > NAME_MAXLEN {
        return Err(ConstructError::NameTooLong { max: NAME_MAXLEN });
    }

    let physical_start: u64 = args[5]
        .parse()
        .map_err(|_| ConstructError::InvalidDeviceStart)?;

    Ok(DestripeArgs {
        stripe_count,
        stripe_index,
        chunk_size,
        device: args[4].to_string(),
        physical_start,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(len: u64) -> TargetParams {
        TargetParams {
            name: "dst0".to_string(),
            start: 0,
            len,
        }
    }

    #[test]
    fn test_valid_line() {
        let args = parse_args(&params(1024), &["4", "1", "8", "1", "sda", "2048"]).unwrap();
        assert_eq!(
            args,
            DestripeArgs {
                stripe_count: 4,
                stripe_index: 1,
                chunk_size: 8,
                device: "sda".to_string(),
                physical_start: 2048,
            }
        );
    }

    #[test]
    fn test_too_few_arguments() {
        let err = parse_args(&params(1024), &["4", "1"]).unwrap_err();
        assert!(matches!(err, ConstructError::NotEnoughArguments));
    }

    #[test]
    fn test_stripe_count_bounds() {
        for bad in ["0", "1", "17", "x", "4x", "-2", ""] {
            let err = parse_args(&params(1024), &[bad, "0", "8", "1", "sda", "0"]).unwrap_err();
            assert!(matches!(err, ConstructError::InvalidStripeCount), "{bad}");
        }
        // Inclusive bounds are fine.
        assert!(parse_args(&params(1024), &["2", "0", "8", "1", "sda", "0"]).is_ok());
        assert!(parse_args(&params(1024), &["16", "0", "8", "1", "sda", "0"]).is_ok());
    }

    #[test]
    fn test_stripe_index_bounds() {
        let err = parse_args(&params(1024), &["4", "4", "8", "1", "sda", "0"]).unwrap_err();
        assert!(matches!(err, ConstructError::InvalidStripeIndex));
        let err = parse_args(&params(1024), &["4", "1q", "8", "1", "sda", "0"]).unwrap_err();
        assert!(matches!(err, ConstructError::InvalidStripeIndex));
        assert!(parse_args(&params(1024), &["4", "3", "8", "1", "sda", "0"]).is_ok());
    }

    #[test]
    fn test_chunk_size_constraints() {
        let err = parse_args(&params(1024), &["4", "1", "0", "1", "sda", "0"]).unwrap_err();
        assert!(matches!(err, ConstructError::InvalidChunkSize));

        // Not a power of two.
        let err = parse_args(&params(1024), &["4", "1", "12", "1", "sda", "0"]).unwrap_err();
        assert!(matches!(err, ConstructError::UnalignedChunkSize { .. }));

        // Power of two but below one page worth of sectors.
        let err = parse_args(&params(1024), &["4", "1", "4", "1", "sda", "0"]).unwrap_err();
        assert!(matches!(err, ConstructError::UnalignedChunkSize { .. }));
    }

    #[test]
    fn test_length_divisibility() {
        let err = parse_args(&params(1023), &["4", "1", "8", "1", "sda", "0"]).unwrap_err();
        assert!(matches!(err, ConstructError::UnalignedLength));
    }

    #[test]
    fn test_device_group() {
        let err = parse_args(&params(1024), &["4", "1", "8", "1", "sda"]).unwrap_err();
        assert!(matches!(err, ConstructError::WrongArgumentCount));

        let err = parse_args(&params(1024), &["4", "1", "8", "2", "sda", "0"]).unwrap_err();
        assert!(matches!(err, ConstructError::InvalidDeviceCount));

        let err = parse_args(&params(1024), &["4", "1", "8", "1", "sda", "12cows"]).unwrap_err();
        assert!(matches!(err, ConstructError::InvalidDeviceStart));
    }

    #[test]
    fn test_name_length_bound() {
        let long = TargetParams {
            name: "a-very-long-target-name".to_string(),
            start: 0,
            len: 1024,
        };
        let err = parse_args(&long, &["4", "1", "8", "1", "sda", "0"]).unwrap_err();
        assert!(matches!(err, ConstructError::NameTooLong { .. }));
    }
}
