/*!
```console
               __
__   _____  /\ \ \_   _ _ __ ___
\ \ / / _ \/  \/ / | | | '_ ` _ \
 \ V /  __/ /\  /| |_| | | | | | |
  \_/ \___\_\ \/  \__,_|_| |_| |_|
```

Execution core for N-dimensional arrays: type-erased storage, strided
iteration, and an engine that plans each operation and picks where its
result is written.
*/

mod core;

pub use self::core::*;
