//! T-SQL skeletons. Tokens on their own line hold pre-indented fragments and
//! vanish when the fragment is empty.

pub const GET: &str = "\
CREATE OR ALTER PROCEDURE {PROCEDURE}
{PARAMETERS}
AS
BEGIN
    SET NOCOUNT ON;
{ARRAY_QUERIES}
    SELECT
{SELECT_LIST}
    FROM {TABLE} a
{JOINS}
    WHERE {PK_FILTER};
END
";

pub const LOOKUP: &str = "\
CREATE OR ALTER PROCEDURE {PROCEDURE}
{PARAMETERS}
AS
BEGIN
    SET NOCOUNT ON;
    SELECT a.{DESCRIPTION}
    FROM {TABLE} a
    WHERE {PK_FILTER};
END
";

pub const UPDATE: &str = "\
CREATE OR ALTER PROCEDURE {PROCEDURE}
{PARAMETERS}
AS
BEGIN
    SET NOCOUNT ON;
{NORMALIZE}
{REQUIRED_CHECKS}
    DECLARE @cu datetime;
    DECLARE @now datetime = GETDATE();
{AUTONUM_DECLARE}
    BEGIN TRY
        BEGIN TRAN;
{ARRAY_STAGING}
        SELECT @cu = [dt_lu]
        FROM {TABLE} WITH (ROWLOCK, HOLDLOCK, UPDLOCK)
        WHERE {PK_WHERE};
        IF @cu IS NULL
        BEGIN
{AUTONUM_ALLOCATE}
            INSERT INTO {TABLE} ({INSERT_COLUMNS})
            VALUES ({INSERT_VALUES});
{SATELLITE_INSERTS}
            COMMIT TRAN;
{INSERT_STATUS}
            RETURN;
        END
        IF @{LU} IS NULL OR @{LU} <> @cu
        BEGIN
            ROLLBACK TRAN;
            SELECT 4 AS status, N'Record changed' AS message;
            RETURN;
        END
{UPDATE_STATEMENT}
{SATELLITE_UPDATES}
        COMMIT TRAN;
        SELECT 0 AS status, N'OK' AS message;
    END TRY
    BEGIN CATCH
        IF @@TRANCOUNT > 0 ROLLBACK TRAN;
        THROW;
    END CATCH
END
";

pub const INNER_UPDATE: &str = "\
CREATE OR ALTER PROCEDURE {PROCEDURE}
{PARAMETERS}
AS
BEGIN
    SET NOCOUNT ON;
    IF @@TRANCOUNT = 0
        THROW 50001, N'{NAME} requires an open transaction', 1;
{NORMALIZE}
{REQUIRED_CHECKS}
    DECLARE @cu datetime;
    DECLARE @now datetime = GETDATE();
{AUTONUM_DECLARE}
{ARRAY_STAGING}
    SELECT @cu = [dt_lu]
    FROM {TABLE} WITH (ROWLOCK, HOLDLOCK, UPDLOCK)
    WHERE {PK_WHERE};
    IF @cu IS NULL
    BEGIN
{AUTONUM_ALLOCATE}
        INSERT INTO {TABLE} ({INSERT_COLUMNS})
        VALUES ({INSERT_VALUES});
{SATELLITE_INSERTS}
{INSERT_STATUS}
        RETURN;
    END
    IF @{LU} IS NULL OR @{LU} <> @cu
    BEGIN
        SET @status = 4;
        SET @message = N'Record changed';
        RETURN;
    END
{UPDATE_STATEMENT}
{SATELLITE_UPDATES}
    SET @status = 0;
    SET @message = N'OK';
END
";

pub const DROP: &str = "\
CREATE OR ALTER PROCEDURE {PROCEDURE}
{PARAMETERS}
AS
BEGIN
    SET NOCOUNT ON;
{REQUIRED_CHECKS}
    BEGIN TRY
        BEGIN TRAN;
{SATELLITE_DELETES}
        DELETE FROM {TABLE}
        WHERE {PK_WHERE};
        COMMIT TRAN;
        SELECT 0 AS status, N'OK' AS message;
    END TRY
    BEGIN CATCH
        IF @@TRANCOUNT > 0 ROLLBACK TRAN;
        THROW;
    END CATCH
END
";

pub const INNER_DROP: &str = "\
CREATE OR ALTER PROCEDURE {PROCEDURE}
{PARAMETERS}
AS
BEGIN
    SET NOCOUNT ON;
    IF @@TRANCOUNT = 0
        THROW 50001, N'{NAME} requires an open transaction', 1;
{REQUIRED_CHECKS}
{SATELLITE_DELETES}
    DELETE FROM {TABLE}
    WHERE {PK_WHERE};
    SET @status = 0;
    SET @message = N'OK';
END
";

/// Outer procedure owning the transaction around an inner `_iupdate`/`_idrop`.
pub const WRAPPER: &str = "\
CREATE OR ALTER PROCEDURE {PROCEDURE}
{PARAMETERS}
AS
BEGIN
    SET NOCOUNT ON;
    DECLARE @status int;
    DECLARE @message nvarchar(200);
    BEGIN TRY
        BEGIN TRAN;
        EXEC {INNER}
{ARGUMENTS}
        IF @status IN (0, 15)
            COMMIT TRAN;
        ELSE
            ROLLBACK TRAN;
        SELECT @status AS status, @message AS message;
    END TRY
    BEGIN CATCH
        IF @@TRANCOUNT > 0 ROLLBACK TRAN;
        THROW;
    END CATCH
END
";

pub const VIEW: &str = "\
CREATE OR ALTER PROCEDURE {PROCEDURE}
{PARAMETERS}
AS
BEGIN
    SET NOCOUNT ON;
{ISOLATION}
{PHRASES}
    SELECT TOP ({ROW_LIMIT})
{SELECT_LIST}
    FROM {TABLE} a
{JOINS}
    WHERE {FILTERS}
{PAGING}
{LIKE_FILTER}
    ORDER BY
        CASE WHEN @{MODE} = 'B' THEN {BROWSING_COLUMN} END DESC,
        {BROWSING_COLUMN} ASC;
END
";

pub const CREATE_TABLE: &str = "\
CREATE TABLE {TABLE} (
{COLUMNS}
);
{INDEXES}
";

pub const VALUES_TABLE: &str = "\
IF OBJECT_ID(N'{QUALIFIED}', N'U') IS NULL
CREATE TABLE {TABLE} (
    {ID_COLUMN} varchar(20) NOT NULL,
    {VALUE_COLUMN} varchar(20) NOT NULL,
    {DESCRIPTION_COLUMN} nvarchar(200) NOT NULL,
    CONSTRAINT {PK_NAME} PRIMARY KEY CLUSTERED ({ID_COLUMN}, {VALUE_COLUMN})
);
";

pub const NUMBERING: &str = "\
IF OBJECT_ID(N'{QUALIFIED_TABLE}', N'U') IS NULL
CREATE TABLE {TABLE} (
    [vc_mneo] varchar(20) NOT NULL,
    [bi_value] bigint NOT NULL,
    CONSTRAINT [pk_{TABLE_NAME}] PRIMARY KEY CLUSTERED ([vc_mneo])
);
GO
CREATE OR ALTER PROCEDURE {PROCEDURE}
    @mneo nvarchar(20),
    @value bigint OUTPUT
AS
BEGIN
    SET NOCOUNT ON;
    UPDATE {TABLE} WITH (ROWLOCK, HOLDLOCK)
    SET @value = [bi_value] = [bi_value] + 1
    WHERE [vc_mneo] = @mneo;
    IF @@ROWCOUNT = 0
    BEGIN
        SET @value = 1;
        INSERT INTO {TABLE} ([vc_mneo], [bi_value])
        VALUES (@mneo, @value);
    END
END
";

pub const PHRASE_FUNCTION: &str = "\
CREATE OR ALTER FUNCTION {FUNCTION} (@like nvarchar(max))
RETURNS TABLE
AS
RETURN (
    SELECT DISTINCT LOWER(LTRIM(RTRIM(j.[value]))) AS [phrase]
    FROM OPENJSON(ISNULL(@like, N'[]')) j
    WHERE j.[type] = 1
        AND LTRIM(RTRIM(j.[value])) <> N''
);
";
