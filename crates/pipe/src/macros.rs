/// Declare a fieldless enum that travels on the wire as a small integer.
///
/// Generates `from_wire` (rejecting unknown values) and `to_wire`.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident = $value:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(u8)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                $variant = $value
            ),+
        }

        impl $name {
            /// Decode from a wire value, `None` if the value is not in the set
            pub fn from_wire(value: u32) -> Option<Self> {
                match value {
                    $(v if v == $value => Some(Self::$variant),)+
                    _ => None,
                }
            }

            /// Encode as a wire value
            #[inline]
            pub fn to_wire(self) -> u32 {
                self as u32
            }
        }
    };
}
