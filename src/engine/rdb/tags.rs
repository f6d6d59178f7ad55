//! Однобайтовые теги формата снимка: типы объектов и служебные опкоды.
//!
//! Значения совпадают с форматом RDB версии 9.

use std::fmt;

/// Новейшая поддерживаемая версия формата.
pub const RDB_VERSION: u16 = 9;

/// Строка
pub const TYPE_STRING: u8 = 0;
/// Список из строк (устаревшая форма)
pub const TYPE_LIST: u8 = 1;
pub const TYPE_SET: u8 = 2;
/// Sorted set с текстовыми счётами
pub const TYPE_ZSET: u8 = 3;
pub const TYPE_HASH: u8 = 4;
/// Sorted set с двоичными счётами (8 байт LE)
pub const TYPE_ZSET_2: u8 = 5;
pub const TYPE_MODULE: u8 = 6;
pub const TYPE_MODULE_2: u8 = 7;
pub const TYPE_HASH_ZIPMAP: u8 = 9;
pub const TYPE_LIST_ZIPLIST: u8 = 10;
pub const TYPE_SET_INTSET: u8 = 11;
pub const TYPE_ZSET_ZIPLIST: u8 = 12;
pub const TYPE_HASH_ZIPLIST: u8 = 13;
pub const TYPE_LIST_QUICKLIST: u8 = 14;
pub const TYPE_STREAM_LISTPACKS: u8 = 15;

pub const OPCODE_MODULE_AUX: u8 = 247;
/// Время простоя LRU
pub const OPCODE_IDLE: u8 = 248;
/// Частота LFU
pub const OPCODE_FREQ: u8 = 249;
pub const OPCODE_AUX: u8 = 250;
pub const OPCODE_RESIZEDB: u8 = 251;
pub const OPCODE_EXPIRETIME_MS: u8 = 252;
pub const OPCODE_EXPIRETIME: u8 = 253;
pub const OPCODE_SELECTDB: u8 = 254;
pub const OPCODE_EOF: u8 = 255;

/// Распознанный тег: тип объекта или опкод.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    String,
    List,
    Set,
    ZSet,
    Hash,
    ZSet2,
    Module,
    Module2,
    HashZipmap,
    ListZiplist,
    SetIntset,
    ZSetZiplist,
    HashZiplist,
    ListQuicklist,
    StreamListpacks,
    ModuleAux,
    Idle,
    Freq,
    Aux,
    ResizeDb,
    ExpireTimeMs,
    ExpireTime,
    SelectDb,
    Eof,
}

impl TypeTag {
    pub fn from_byte(b: u8) -> Option<Self> {
        let tag = match b {
            TYPE_STRING => Self::String,
            TYPE_LIST => Self::List,
            TYPE_SET => Self::Set,
            TYPE_ZSET => Self::ZSet,
            TYPE_HASH => Self::Hash,
            TYPE_ZSET_2 => Self::ZSet2,
            TYPE_MODULE => Self::Module,
            TYPE_MODULE_2 => Self::Module2,
            TYPE_HASH_ZIPMAP => Self::HashZipmap,
            TYPE_LIST_ZIPLIST => Self::ListZiplist,
            TYPE_SET_INTSET => Self::SetIntset,
            TYPE_ZSET_ZIPLIST => Self::ZSetZiplist,
            TYPE_HASH_ZIPLIST => Self::HashZiplist,
            TYPE_LIST_QUICKLIST => Self::ListQuicklist,
            TYPE_STREAM_LISTPACKS => Self::StreamListpacks,
            OPCODE_MODULE_AUX => Self::ModuleAux,
            OPCODE_IDLE => Self::Idle,
            OPCODE_FREQ => Self::Freq,
            OPCODE_AUX => Self::Aux,
            OPCODE_RESIZEDB => Self::ResizeDb,
            OPCODE_EXPIRETIME_MS => Self::ExpireTimeMs,
            OPCODE_EXPIRETIME => Self::ExpireTime,
            OPCODE_SELECTDB => Self::SelectDb,
            OPCODE_EOF => Self::Eof,
            _ => return None,
        };
        Some(tag)
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::String => TYPE_STRING,
            Self::List => TYPE_LIST,
            Self::Set => TYPE_SET,
            Self::ZSet => TYPE_ZSET,
            Self::Hash => TYPE_HASH,
            Self::ZSet2 => TYPE_ZSET_2,
            Self::Module => TYPE_MODULE,
            Self::Module2 => TYPE_MODULE_2,
            Self::HashZipmap => TYPE_HASH_ZIPMAP,
            Self::ListZiplist => TYPE_LIST_ZIPLIST,
            Self::SetIntset => TYPE_SET_INTSET,
            Self::ZSetZiplist => TYPE_ZSET_ZIPLIST,
            Self::HashZiplist => TYPE_HASH_ZIPLIST,
            Self::ListQuicklist => TYPE_LIST_QUICKLIST,
            Self::StreamListpacks => TYPE_STREAM_LISTPACKS,
            Self::ModuleAux => OPCODE_MODULE_AUX,
            Self::Idle => OPCODE_IDLE,
            Self::Freq => OPCODE_FREQ,
            Self::Aux => OPCODE_AUX,
            Self::ResizeDb => OPCODE_RESIZEDB,
            Self::ExpireTimeMs => OPCODE_EXPIRETIME_MS,
            Self::ExpireTime => OPCODE_EXPIRETIME,
            Self::SelectDb => OPCODE_SELECTDB,
            Self::Eof => OPCODE_EOF,
        }
    }

    /// `true` для тегов, за которыми следует объект.
    pub fn is_object(self) -> bool {
        self.as_byte() <= TYPE_STREAM_LISTPACKS
    }
}

impl fmt::Display for TypeTag {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.as_byte())
    }
}
