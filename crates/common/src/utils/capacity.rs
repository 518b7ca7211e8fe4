/// 容量换算
///
/// 所有组件上报的容量（卷、快照、存储池）都必须经过这里换算为整数 GB，
/// 保证各处的取整方式一致（向下取整）

use crate::{Error, Result};

/// 1 GB 对应的位移量
pub const SIZE_SHIFT_BIT: u32 = 30;

/// 字节数换算为 GB，向下取整
pub fn to_canonical_gb(raw_bytes: u64) -> u64 {
    raw_bytes >> SIZE_SHIFT_BIT
}

/// GB 换算为字节数，超出 u64 范围时报错
pub fn gb_to_bytes(gb: u64) -> Result<u64> {
    gb.checked_mul(1u64 << SIZE_SHIFT_BIT)
        .ok_or_else(|| Error::InvalidArgument(format!("size {}GB is too large", gb)))
}

fn unit_shift(unit: char) -> Option<u32> {
    match unit {
        'K' => Some(10),
        'M' => Some(20),
        'G' => Some(30),
        'T' => Some(40),
        'P' => Some(50),
        'E' => Some(60),
        _ => None,
    }
}

/// 解析管理工具输出的容量字符串（如 `942M`、`0`、`19053M`），返回字节数
///
/// 单位为 1024 的幂，大小写不敏感，允许末尾带 `B`；不带单位时按字节处理
pub fn parse_capacity_str(raw: &str) -> Result<u64> {
    let upper = raw.trim().to_ascii_uppercase();
    let body = match upper.strip_suffix('B') {
        Some(rest) if !rest.is_empty() => rest,
        _ => upper.as_str(),
    };

    let (digits, shift) = match body.chars().last() {
        Some(c) if c.is_ascii_digit() => (body, 0),
        Some(unit) => {
            let shift = unit_shift(unit)
                .ok_or_else(|| Error::Backend(format!("unknown capacity unit in '{}'", raw)))?;
            (&body[..body.len() - unit.len_utf8()], shift)
        }
        None => return Err(Error::Backend("empty capacity string".to_string())),
    };

    let value: u64 = digits
        .parse()
        .map_err(|e| Error::Backend(format!("invalid capacity '{}': {}", raw, e)))?;

    value
        .checked_mul(1u64 << shift)
        .ok_or_else(|| Error::Backend(format!("capacity '{}' overflows", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_canonical_gb() {
        assert_eq!(to_canonical_gb(1 << 30), 1);
        assert_eq!(to_canonical_gb(0), 0);
        assert_eq!(to_canonical_gb((1 << 30) - 1), 0);
        assert_eq!(to_canonical_gb((5 << 30) + 123), 5);
        assert_eq!(to_canonical_gb(u64::MAX), u64::MAX / (1 << 30));
    }

    #[test]
    fn test_gb_to_bytes() {
        assert_eq!(gb_to_bytes(1).unwrap(), 1 << 30);
        assert_eq!(to_canonical_gb(gb_to_bytes(42).unwrap()), 42);
        assert_eq!(gb_to_bytes((1 << 34) - 1).unwrap(), u64::MAX - ((1 << 30) - 1));
        assert!(matches!(gb_to_bytes(1 << 34), Err(Error::InvalidArgument(_))));
        assert!(matches!(gb_to_bytes(u64::MAX), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_parse_capacity_str() {
        assert_eq!(parse_capacity_str("0").unwrap(), 0);
        assert_eq!(parse_capacity_str("942M").unwrap(), 942 << 20);
        assert_eq!(parse_capacity_str("2286M").unwrap(), 2286 << 20);
        assert_eq!(parse_capacity_str("3G").unwrap(), 3 << 30);
        assert_eq!(parse_capacity_str("1k").unwrap(), 1024);
        assert_eq!(parse_capacity_str("2TB").unwrap(), 2 << 40);
        assert_eq!(parse_capacity_str("512").unwrap(), 512);
        assert_eq!(parse_capacity_str(" 7M ").unwrap(), 7 << 20);
    }

    #[test]
    fn test_parse_capacity_str_rejects_garbage() {
        assert!(matches!(parse_capacity_str(""), Err(Error::Backend(_))));
        assert!(matches!(parse_capacity_str("12X"), Err(Error::Backend(_))));
        assert!(matches!(parse_capacity_str("M"), Err(Error::Backend(_))));
        assert!(matches!(parse_capacity_str("99999999E"), Err(Error::Backend(_))));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn canonical_gb_is_floor_division(raw in any::<u64>()) {
                prop_assert_eq!(to_canonical_gb(raw), raw / (1u64 << 30));
            }

            #[test]
            fn representable_sizes_round_trip(gb in 0u64..(1u64 << 34)) {
                let bytes = gb_to_bytes(gb)?;
                prop_assert_eq!(to_canonical_gb(bytes), gb);
            }

            #[test]
            fn oversized_requests_are_rejected(gb in (1u64 << 34)..=u64::MAX) {
                prop_assert!(matches!(gb_to_bytes(gb), Err(Error::InvalidArgument(_))));
            }
        }
    }
}
