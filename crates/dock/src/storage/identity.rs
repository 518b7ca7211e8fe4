/// 后端名称编解码
///
/// RBD 镜像只能通过可变的名字寻址，编排层需要稳定的 UUID。
/// 这里把 UUID 编码进镜像名：`<tag>:<display-name>:<uuid>`，
/// 之后所有 ID 到后端名称的查找都只经过 `resolve`

use common::{Error, Result};
use std::fmt;
use uuid::Uuid;

/// 名称字段分隔符
pub const DELIMITER: char = ':';

/// 本系统创建的后端对象统一使用的命名空间标签
pub const NAMESPACE_TAG: &str = "easysds";

/// 解码后的后端名称
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendName {
    pub tag: String,
    pub display_name: String,
    pub id: Uuid,
}

impl fmt::Display for BackendName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}{}",
            self.tag, DELIMITER, self.display_name, DELIMITER, self.id
        )
    }
}

/// 编码后端名称
///
/// 标签和显示名都不允许包含分隔符
pub fn encode(tag: &str, display_name: &str, id: &Uuid) -> Result<String> {
    if tag.contains(DELIMITER) {
        return Err(Error::InvalidArgument(format!(
            "tag '{}' must not contain '{}'",
            tag, DELIMITER
        )));
    }
    if display_name.contains(DELIMITER) {
        return Err(Error::InvalidArgument(format!(
            "display name '{}' must not contain '{}'",
            display_name, DELIMITER
        )));
    }

    Ok(format!("{}{}{}{}{}", tag, DELIMITER, display_name, DELIMITER, id))
}

/// 解码后端名称
///
/// ID 取最后一个分隔符之后的部分，标签取第一个分隔符之前的部分，其余为显示名
pub fn decode(name: &str) -> Result<BackendName> {
    let (head, raw_id) = name
        .rsplit_once(DELIMITER)
        .ok_or_else(|| Error::MalformedName(name.to_string()))?;
    let (tag, display_name) = head
        .split_once(DELIMITER)
        .ok_or_else(|| Error::MalformedName(name.to_string()))?;

    let id = Uuid::parse_str(raw_id)
        .map_err(|e| Error::MalformedName(format!("{} ({})", name, e)))?;

    Ok(BackendName {
        tag: tag.to_string(),
        display_name: display_name.to_string(),
        id,
    })
}

/// 在后端名称列表中查找 ID 对应的名称
///
/// 无法解码的名称（非本系统创建的对象）直接跳过
pub fn resolve<'a, I>(id: &Uuid, names: I) -> Result<String>
where
    I: IntoIterator<Item = &'a String>,
{
    names
        .into_iter()
        .find(|name| matches!(decode(name), Ok(decoded) if decoded.id == *id))
        .cloned()
        .ok_or_else(|| Error::NotFound(id.to_string()))
}

/// 解析请求中的 ID 字符串，非法 UUID 视为不存在
pub fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| Error::NotFound(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOLUME_ID: &str = "0e9c3c68-8a0b-11e7-94a7-67f755e235cb";

    #[test]
    fn test_encode_decode() {
        let id = Uuid::parse_str(VOLUME_ID).unwrap();
        let name = encode(NAMESPACE_TAG, "volume001", &id).unwrap();
        assert_eq!(name, format!("easysds:volume001:{}", VOLUME_ID));

        let decoded = decode(&name).unwrap();
        assert_eq!(decoded.tag, NAMESPACE_TAG);
        assert_eq!(decoded.display_name, "volume001");
        assert_eq!(decoded.id, id);
        assert_eq!(decoded.to_string(), name);
    }

    #[test]
    fn test_encode_rejects_delimiter() {
        let id = Uuid::new_v4();
        assert!(matches!(
            encode(NAMESPACE_TAG, "bad:name", &id),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            encode("bad:tag", "volume001", &id),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_decode_keeps_inner_delimiters_in_display_name() {
        let name = format!("easysds:a:b:{}", VOLUME_ID);
        let decoded = decode(&name).unwrap();
        assert_eq!(decoded.tag, "easysds");
        assert_eq!(decoded.display_name, "a:b");
    }

    #[test]
    fn test_decode_malformed() {
        assert!(matches!(decode("plainimage"), Err(Error::MalformedName(_))));
        assert!(matches!(
            decode(&format!("easysds{}", VOLUME_ID)),
            Err(Error::MalformedName(_))
        ));
        assert!(matches!(
            decode(&format!("easysds:{}", VOLUME_ID)),
            Err(Error::MalformedName(_))
        ));
        assert!(matches!(
            decode("easysds:volume001:not-a-uuid"),
            Err(Error::MalformedName(_))
        ));
    }

    #[test]
    fn test_resolve() {
        let id = Uuid::parse_str(VOLUME_ID).unwrap();
        let names = vec![
            "foreign-image".to_string(),
            format!("easysds:other:{}", Uuid::new_v4()),
            format!("easysds:volume001:{}", VOLUME_ID),
        ];
        assert_eq!(resolve(&id, &names).unwrap(), names[2]);

        let missing = Uuid::new_v4();
        assert!(matches!(resolve(&missing, &names), Err(Error::NotFound(_))));
        assert!(matches!(resolve(&id, &Vec::<String>::new()), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_parse_id() {
        assert!(parse_id(VOLUME_ID).is_ok());
        assert!(matches!(parse_id("volume001"), Err(Error::NotFound(_))));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn id_strategy() -> impl Strategy<Value = Uuid> {
            any::<u128>().prop_map(Uuid::from_u128)
        }

        proptest! {
            #[test]
            fn encode_decode_round_trip(
                tag in "[^:]{0,16}",
                display_name in "[^:]{0,64}",
                id in id_strategy(),
            ) {
                let name = encode(&tag, &display_name, &id)?;
                let decoded = decode(&name)?;
                prop_assert_eq!(&decoded.tag, &tag);
                prop_assert_eq!(&decoded.display_name, &display_name);
                prop_assert_eq!(decoded.id, id);
                prop_assert_eq!(decoded.to_string(), name);
            }

            #[test]
            fn resolve_finds_encoded_id(
                names in prop::collection::vec(("[^:]{1,16}", id_strategy()), 1..8),
                pick in any::<prop::sample::Index>(),
            ) {
                let encoded: Vec<String> = names
                    .iter()
                    .map(|(name, id)| encode(NAMESPACE_TAG, name, id))
                    .collect::<Result<_>>()?;
                let target = pick.index(names.len());
                let (_, id) = &names[target];

                let found = resolve(id, &encoded)?;
                prop_assert_eq!(decode(&found)?.id, *id);
            }
        }
    }
}
